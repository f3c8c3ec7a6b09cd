// src/config/validate.rs

use std::time::Duration;

use url::Url;

use crate::config::model::{
    level_from_stdlib, AppSettings, DatabaseSettings, LogSettings, RawSettings, RedisSettings,
    SecretString, ServerSettings, Settings, SupervisorSettings, WorkerSettings,
};
use crate::errors::StackError;

impl TryFrom<RawSettings> for Settings {
    type Error = StackError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        let mut problems = Vec::new();
        validate_secret(&raw, &mut problems);
        validate_server(&raw, &mut problems);
        validate_commands(&raw, &mut problems);
        validate_worker(&raw, &mut problems);
        let level = level_from_stdlib(raw.log_level);
        if level.is_none() {
            problems.push(format!(
                "LOG_LEVEL must be one of 0, 10, 20, 30, 40, 50 (got {})",
                raw.log_level
            ));
        }
        let db_url = parse_service_url("DB_URL", &raw.db_url, &mut problems);
        let redis_url = parse_service_url("REDIS_URL", &raw.redis_url, &mut problems);

        let (Some(secret), Some(level), Some(db_url), Some(redis_url), true) = (
            raw.app_secret_key,
            level,
            db_url,
            redis_url,
            problems.is_empty(),
        ) else {
            return Err(StackError::Configuration(problems.join("; ")));
        };

        Ok(Settings {
            server: ServerSettings {
                app_loc: raw.server_app_loc,
                app_loc_is_factory: raw.server_app_loc_is_factory,
                command: raw.server_command,
                host: raw.server_host,
                port: raw.server_port,
                keepalive: Duration::from_secs(raw.server_keepalive),
                reload: raw.server_reload,
                reload_dirs: raw.server_reload_dirs,
                http_workers: raw.server_http_workers,
            },
            app: AppSettings {
                name: raw.app_name,
                build_number: raw.app_build_number,
                environment: raw.app_environment,
                debug: raw.app_debug,
                dev_mode: raw.app_dev_mode,
                secret_key: SecretString::new(secret),
                asset_run_command: raw.asset_run_command,
            },
            log: LogSettings {
                level,
                worker_event: raw.log_worker_event,
                asset_event: raw.log_asset_event,
            },
            worker: WorkerSettings {
                concurrency: raw.worker_concurrency,
            },
            supervisor: SupervisorSettings {
                terminate_timeout: Duration::from_secs(raw.process_terminate_timeout),
            },
            db: DatabaseSettings { url: db_url },
            redis: RedisSettings {
                url: redis_url,
                socket_connect_timeout: Duration::from_secs(raw.redis_socket_connect_timeout),
            },
        })
    }
}

fn validate_secret(raw: &RawSettings, problems: &mut Vec<String>) {
    match raw.app_secret_key.as_deref() {
        Some(secret) if !secret.trim().is_empty() => {}
        _ => problems.push("APP_SECRET_KEY is required and must not be empty".to_string()),
    }
}

fn validate_server(raw: &RawSettings, problems: &mut Vec<String>) {
    if raw.server_port == 0 {
        problems.push("SERVER_PORT must be between 1 and 65535 (got 0)".to_string());
    }
    if raw.server_host.trim().is_empty() {
        problems.push("SERVER_HOST must not be empty".to_string());
    }
    if raw.server_http_workers == Some(0) {
        problems.push("SERVER_HTTP_WORKERS must be >= 1 (got 0)".to_string());
    }
}

fn validate_commands(raw: &RawSettings, problems: &mut Vec<String>) {
    if raw.server_command.trim().is_empty() {
        problems.push("SERVER_COMMAND must not be empty".to_string());
    }
    if raw.asset_run_command.trim().is_empty() {
        problems.push("ASSET_RUN_COMMAND must not be empty".to_string());
    }
}

fn validate_worker(raw: &RawSettings, problems: &mut Vec<String>) {
    if raw.worker_concurrency == 0 {
        problems.push("WORKER_CONCURRENCY must be >= 1 (got 0)".to_string());
    }
}

fn parse_service_url(name: &str, value: &str, problems: &mut Vec<String>) -> Option<Url> {
    match Url::parse(value) {
        Ok(url) if url.host_str().is_some() => Some(url),
        Ok(_) => {
            problems.push(format!("{name} must include a host (got '{value}')"));
            None
        }
        Err(e) => {
            problems.push(format!("{name} is not a valid URL: {e}"));
            None
        }
    }
}
