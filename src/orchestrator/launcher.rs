// src/orchestrator/launcher.rs

//! Pluggable process launcher.
//!
//! The orchestrator talks to a `ProcessLauncher` instead of spawning
//! processes itself, so tests can swap in a fake that records what was
//! started and stopped.

use crate::cli::LogLevel;
use crate::config::Settings;
use crate::errors::Result;
use crate::supervisor::{self, ChildProcess, ServerInvocation};
use crate::types::BoxFuture;

/// How `run-all` starts its children.
pub trait ProcessLauncher: Send {
    /// Start the background worker process.
    fn start_worker<'a>(
        &'a mut self,
        settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>>;

    /// Start the asset dev-server (development mode only).
    fn start_asset_dev_server<'a>(
        &'a mut self,
        settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>>;

    /// Start the HTTP server; the orchestrator waits on it in the foreground.
    fn start_http_server<'a>(
        &'a mut self,
        invocation: ServerInvocation,
        settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>>;
}

/// Launcher used in production: real OS processes via [`supervisor`].
#[derive(Debug, Clone, Default)]
pub struct RealLauncher {
    worker_log_level: Option<LogLevel>,
}

impl RealLauncher {
    /// `worker_log_level` is forwarded to the worker as `--log-level`.
    pub fn new(worker_log_level: Option<LogLevel>) -> Self {
        Self { worker_log_level }
    }
}

impl ProcessLauncher for RealLauncher {
    fn start_worker<'a>(
        &'a mut self,
        settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>> {
        let level = self.worker_log_level;
        Box::pin(async move {
            let process = supervisor::start_worker(settings, level)?;
            Ok(Box::new(process) as Box<dyn ChildProcess>)
        })
    }

    fn start_asset_dev_server<'a>(
        &'a mut self,
        settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>> {
        Box::pin(async move {
            let process = supervisor::start_asset_dev_server(settings)?;
            Ok(Box::new(process) as Box<dyn ChildProcess>)
        })
    }

    fn start_http_server<'a>(
        &'a mut self,
        invocation: ServerInvocation,
        settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>> {
        Box::pin(async move {
            let process =
                supervisor::start_http_server(&invocation, settings.supervisor.terminate_timeout)?;
            Ok(Box::new(process) as Box<dyn ChildProcess>)
        })
    }
}
