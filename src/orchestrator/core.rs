// src/orchestrator/core.rs

//! The `run-all` lifecycle.
//!
//! `Idle → Starting → Running → ShuttingDown → Terminated`
//!
//! `ShuttingDown` is entered on every path out of `Starting`/`Running`
//! (server exit, interrupt, spawn failure) and stops every spawned child
//! once, newest first. The HTTP server counts as a child, so an interrupt
//! stops it with SIGTERM like the rest. Each start step races the
//! shutdown future, so an interrupt during `Starting` also lands here.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::orchestrator::launcher::ProcessLauncher;
use crate::supervisor::{ChildProcess, ServerInvocation};
use crate::types::ProcessRole;

/// Exit code after an interrupt (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Exit code when a child could not be started.
pub const SPAWN_FAILED_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Starting => "starting",
            OrchestratorState::Running => "running",
            OrchestratorState::ShuttingDown => "shutting-down",
            OrchestratorState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why the orchestrator left `Starting`/`Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The HTTP server exited on its own with this code.
    ServerExited(i32),
    /// The shutdown future resolved (Ctrl-C / SIGTERM).
    Interrupted,
    /// A child could not be started.
    SpawnFailed(ProcessRole),
    /// The HTTP server could not be launched or waited on.
    ServerFailed,
}

impl ShutdownTrigger {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownTrigger::ServerExited(code) => *code,
            ShutdownTrigger::Interrupted => INTERRUPTED_EXIT_CODE,
            ShutdownTrigger::SpawnFailed(_) | ShutdownTrigger::ServerFailed => {
                SPAWN_FAILED_EXIT_CODE
            }
        }
    }
}

/// What happened during one `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub exit_code: i32,
    pub trigger: ShutdownTrigger,
    /// Roles of the children that were started, in spawn order. Includes
    /// the HTTP server once it was started.
    pub spawned: Vec<ProcessRole>,
    /// Children whose termination returned an error.
    pub termination_failures: usize,
    /// Every state the orchestrator passed through, starting with `Idle`.
    pub transitions: Vec<OrchestratorState>,
}

/// Drives the worker, the optional asset dev-server and the foreground
/// HTTP server.
pub struct Orchestrator<L> {
    settings: Settings,
    launcher: L,
    state: OrchestratorState,
    transitions: Vec<OrchestratorState>,
}

impl<L: ProcessLauncher> Orchestrator<L> {
    pub fn new(settings: Settings, launcher: L) -> Self {
        Self {
            settings,
            launcher,
            state: OrchestratorState::Idle,
            transitions: vec![OrchestratorState::Idle],
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Run until the server exits, `shutdown` resolves, or a spawn fails.
    pub async fn run<F>(mut self, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        self.transition(OrchestratorState::Starting);

        let mut children: Vec<Box<dyn ChildProcess>> = Vec::new();
        let trigger = self.start_and_serve(&mut children, shutdown).await;
        let spawned: Vec<ProcessRole> = children.iter().map(|c| c.role()).collect();

        self.transition(OrchestratorState::ShuttingDown);
        info!(?trigger, children = children.len(), "shutting down");
        let termination_failures = terminate_all(children).await;
        self.transition(OrchestratorState::Terminated);

        let exit_code = trigger.exit_code();
        info!(exit_code, termination_failures, "run-all finished");

        RunReport {
            exit_code,
            trigger,
            spawned,
            termination_failures,
            transitions: self.transitions,
        }
    }

    async fn start_and_serve<F>(
        &mut self,
        children: &mut Vec<Box<dyn ChildProcess>>,
        shutdown: F,
    ) -> ShutdownTrigger
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let worker = self.launcher.start_worker(&self.settings);
        let Some(started) = unless_interrupted(worker, shutdown.as_mut()).await else {
            return interrupted();
        };
        match started {
            Ok(child) => children.push(child),
            Err(err) => {
                error!(role = %ProcessRole::Worker, error = %err, "could not start worker");
                return ShutdownTrigger::SpawnFailed(ProcessRole::Worker);
            }
        }

        if self.settings.app.dev_mode {
            let assets = self.launcher.start_asset_dev_server(&self.settings);
            let Some(started) = unless_interrupted(assets, shutdown.as_mut()).await else {
                return interrupted();
            };
            match started {
                Ok(child) => children.push(child),
                Err(err) => {
                    error!(
                        role = %ProcessRole::AssetDevServer,
                        error = %err,
                        "could not start asset dev-server"
                    );
                    return ShutdownTrigger::SpawnFailed(ProcessRole::AssetDevServer);
                }
            }
        } else {
            debug!("development mode off; asset dev-server not started");
        }

        let invocation = ServerInvocation::from_settings(&self.settings);
        info!(
            app = %self.settings.app.name,
            environment = %self.settings.app.environment,
            host = %self.settings.server.host,
            port = self.settings.server.port,
            workers = ?invocation.workers(),
            reload = self.settings.reload_enabled(),
            "starting http server"
        );
        self.transition(OrchestratorState::Running);

        let server = self.launcher.start_http_server(invocation, &self.settings);
        let Some(started) = unless_interrupted(server, shutdown.as_mut()).await else {
            return interrupted();
        };
        let mut server = match started {
            Ok(server) => server,
            Err(err) => {
                error!(role = %ProcessRole::HttpServer, error = %err, "http server failed to start");
                return ShutdownTrigger::ServerFailed;
            }
        };

        let outcome = unless_interrupted(server.wait(), shutdown.as_mut()).await;
        // Still running after an interrupt; stopped with the others.
        children.push(server);

        match outcome {
            Some(Ok(code)) => ShutdownTrigger::ServerExited(code),
            Some(Err(err)) => {
                error!(role = %ProcessRole::HttpServer, error = %err, "http server failed");
                ShutdownTrigger::ServerFailed
            }
            None => interrupted(),
        }
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!(from = %self.state, to = %next, "orchestrator state change");
        self.state = next;
        self.transitions.push(next);
    }
}

/// Drive `step` unless `shutdown` resolves first, in which case `step` is
/// dropped and `None` returned.
async fn unless_interrupted<T, S>(step: impl Future<Output = T>, shutdown: Pin<&mut S>) -> Option<T>
where
    S: Future<Output = ()>,
{
    tokio::select! {
        value = step => Some(value),
        _ = shutdown => None,
    }
}

fn interrupted() -> ShutdownTrigger {
    info!("interrupt received");
    ShutdownTrigger::Interrupted
}

/// Terminate `children` newest first; returns how many failed.
async fn terminate_all(mut children: Vec<Box<dyn ChildProcess>>) -> usize {
    let mut failures = 0;
    while let Some(mut child) = children.pop() {
        let role = child.role();
        if let Err(err) = child.terminate().await {
            warn!(role = %role, error = %err, "child termination failed");
            failures += 1;
        }
    }
    failures
}
