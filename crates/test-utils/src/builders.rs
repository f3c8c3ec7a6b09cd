#![allow(dead_code)]

use std::time::Duration;

use stackctl::config::{RawSettings, Settings};

/// Secret used by every builder-made settings value.
pub const TEST_SECRET: &str = "test-secret-key";

/// Builder for `Settings` to simplify test setup.
///
/// Starts from the built-in defaults plus a secret key, so `build()` passes
/// validation unless a setter breaks it on purpose.
pub struct SettingsBuilder {
    raw: RawSettings,
    terminate_timeout: Option<Duration>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawSettings {
                app_secret_key: Some(TEST_SECRET.to_string()),
                ..RawSettings::default()
            },
            terminate_timeout: None,
        }
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.raw.app_name = name.to_string();
        self
    }

    pub fn dev_mode(mut self, on: bool) -> Self {
        self.raw.app_dev_mode = on;
        self
    }

    pub fn reload(mut self, reload: Option<bool>) -> Self {
        self.raw.server_reload = reload;
        self
    }

    pub fn reload_dirs(mut self, dirs: &[&str]) -> Self {
        self.raw.server_reload_dirs = dirs.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.raw.server_host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.raw.server_port = port;
        self
    }

    pub fn http_workers(mut self, workers: Option<usize>) -> Self {
        self.raw.server_http_workers = workers;
        self
    }

    pub fn factory(mut self, on: bool) -> Self {
        self.raw.server_app_loc_is_factory = on;
        self
    }

    pub fn server_command(mut self, cmd: &str) -> Self {
        self.raw.server_command = cmd.to_string();
        self
    }

    pub fn asset_run_command(mut self, cmd: &str) -> Self {
        self.raw.asset_run_command = cmd.to_string();
        self
    }

    pub fn asset_event(mut self, event: &str) -> Self {
        self.raw.log_asset_event = event.to_string();
        self
    }

    pub fn worker_concurrency(mut self, n: usize) -> Self {
        self.raw.worker_concurrency = n;
        self
    }

    pub fn db_url(mut self, url: &str) -> Self {
        self.raw.db_url = url.to_string();
        self
    }

    pub fn redis_url(mut self, url: &str) -> Self {
        self.raw.redis_url = url.to_string();
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.raw.redis_socket_connect_timeout = secs;
        self
    }

    /// Sub-second values are allowed here, unlike the env setting.
    pub fn terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = Some(timeout);
        self
    }

    pub fn raw(self) -> RawSettings {
        self.raw
    }

    pub fn build(self) -> Settings {
        let mut settings =
            Settings::try_from(self.raw).expect("Failed to build valid settings from builder");
        if let Some(timeout) = self.terminate_timeout {
            settings.supervisor.terminate_timeout = timeout;
        }
        settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
