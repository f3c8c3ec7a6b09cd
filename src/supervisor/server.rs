// src/supervisor/server.rs

//! HTTP server command line and foreground execution.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::info;

use crate::config::Settings;
use crate::errors::{Result, StackError};
use crate::supervisor::process::SupervisedProcess;
use crate::types::ProcessRole;

/// Program and arguments for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerInvocation {
    /// Build the command line from `settings`.
    ///
    /// `SERVER_COMMAND` may carry extra words (`python -m uvicorn`); the
    /// first word is the program and the rest lead the argument list.
    pub fn from_settings(settings: &Settings) -> Self {
        let server = &settings.server;
        let mut words = server.command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_default();
        let mut args: Vec<String> = words.collect();

        let reload = settings.reload_enabled();

        args.push(server.app_loc.clone());
        if reload {
            args.push("--reload".to_string());
        }
        args.push(format!("--host={}", server.host));
        args.push(format!("--port={}", server.port));
        args.push(format!("--workers={}", http_worker_count(settings)));
        if server.app_loc_is_factory {
            args.push("--factory".to_string());
        }
        args.push("--loop=auto".to_string());
        args.push("--no-access-log".to_string());
        args.push(format!(
            "--timeout-keep-alive={}",
            server.keepalive.as_secs()
        ));
        if reload {
            for dir in server.reload_dirs.iter() {
                args.push(format!("--reload-dir={dir}"));
            }
        }

        Self { program, args }
    }

    /// Value of a `--name=value` argument.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("--{name}=");
        self.args
            .iter()
            .find_map(|arg| arg.strip_prefix(prefix.as_str()))
    }

    /// Whether the bare switch `--name` is present.
    pub fn has_switch(&self, name: &str) -> bool {
        let switch = format!("--{name}");
        self.args.iter().any(|arg| *arg == switch)
    }

    pub fn workers(&self) -> Option<usize> {
        self.flag_value("workers").and_then(|v| v.parse().ok())
    }

    pub fn host(&self) -> Option<&str> {
        self.flag_value("host")
    }

    pub fn port(&self) -> Option<u16> {
        self.flag_value("port").and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for ServerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in self.args.iter() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// HTTP worker processes for the server.
///
/// Reload and development mode need a single process. Otherwise the
/// configured count is used, falling back to CPU count + 1.
pub fn http_worker_count(settings: &Settings) -> usize {
    if settings.reload_enabled() || settings.app.dev_mode {
        return 1;
    }
    settings.server.http_workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            + 1
    })
}

/// Start the server with inherited stdio.
///
/// The returned process is waited on with [`SupervisedProcess::wait`] and
/// stopped like any other child, SIGTERM first.
pub fn start_http_server(
    invocation: &ServerInvocation,
    terminate_timeout: Duration,
) -> Result<SupervisedProcess> {
    let role = ProcessRole::HttpServer;

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|source| StackError::ProcessSpawn { role, source })?;

    info!(role = %role, pid = ?child.id(), cmd = %invocation, "http server started");
    Ok(SupervisedProcess::new(role, child, terminate_timeout))
}

/// Run the server in the foreground until it exits; returns its exit code.
pub async fn run_server_foreground(invocation: &ServerInvocation) -> Result<i32> {
    let mut server = start_http_server(invocation, Duration::ZERO)?;
    server.wait().await
}
