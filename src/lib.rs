// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod queue;
pub mod supervisor;
pub mod system;
pub mod types;
pub mod worker;

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, ServeCommand, WorkerArgs};
use crate::config::{RunAllOverrides, Settings};
use crate::errors::Result;
use crate::logging::{log_level_from_level, LogLevelSources};
use crate::orchestrator::{shutdown_signal, Orchestrator, ProcessLauncher, RealLauncher, RunReport};
use crate::queue::tasks::{default_queues, default_task_table};
use crate::queue::{QueueConfig, QueueRegistry, TaskTable};
use crate::system::{probe_system_health, HealthStatus};

/// High-level entry point used by `main.rs`; returns the process exit code.
///
/// `settings` should already carry the `run-all` overrides (see
/// [`effective_settings`]) and `log_level` is the level logging was
/// initialised with.
pub async fn run(args: CliArgs, settings: Settings, log_level: tracing::Level) -> Result<i32> {
    let Command::Serve(serve) = args.command;
    match serve {
        ServeCommand::RunAll(_) => run_all(settings, log_level).await,
        ServeCommand::Worker(worker_args) => run_worker_process(&worker_args, settings).await,
        ServeCommand::Health => print_health(&settings).await,
    }
}

/// Settings with the `run-all` flags merged over them; other commands get
/// `settings` unchanged.
pub fn effective_settings(args: &CliArgs, settings: &Settings) -> Settings {
    match &args.command {
        Command::Serve(ServeCommand::RunAll(run_all)) => {
            settings.with_overrides(&RunAllOverrides::from(run_all))
        }
        Command::Serve(_) => settings.clone(),
    }
}

/// Level inputs for [`logging::init_logging`].
pub fn log_sources(args: &CliArgs, settings: &Settings) -> LogLevelSources {
    let verbose = match &args.command {
        Command::Serve(ServeCommand::RunAll(run_all)) => run_all.verbose || run_all.debug,
        Command::Serve(_) => false,
    };
    LogLevelSources {
        cli_level: args.log_level,
        verbose,
        settings_level: Some(settings.log_level()),
    }
}

async fn run_all(settings: Settings, log_level: tracing::Level) -> Result<i32> {
    // Installed before anything is spawned so an early signal still ends
    // in an orderly shutdown.
    let shutdown = shutdown_signal();

    info!(
        app = %settings.app.name,
        slug = %settings.app_slug(),
        dev_mode = settings.app.dev_mode,
        "starting run-all"
    );

    let launcher = RealLauncher::new(Some(log_level_from_level(log_level)));
    let report = run_all_with(
        settings,
        launcher,
        default_queues(),
        default_task_table(),
        shutdown,
    )
    .await?;

    if report.termination_failures > 0 {
        warn!(
            failures = report.termination_failures,
            "some children could not be terminated cleanly"
        );
    }
    Ok(report.exit_code)
}

/// Register `queues` against `tasks`, then run the orchestrator.
///
/// A queue declaration that does not register is returned as an error
/// before any child is started.
pub async fn run_all_with<L, F>(
    settings: Settings,
    launcher: L,
    queues: Vec<QueueConfig>,
    tasks: TaskTable,
    shutdown: F,
) -> Result<RunReport>
where
    L: ProcessLauncher,
    F: Future<Output = ()>,
{
    let registry = QueueRegistry::new(queues, tasks)?;
    for queue in registry.queues() {
        debug!(
            queue = %queue.name,
            tasks = queue.tasks.len(),
            cron_jobs = queue.cron_jobs.len(),
            "queue validated"
        );
    }

    Ok(Orchestrator::new(settings, launcher).run(shutdown).await)
}

async fn run_worker_process(args: &WorkerArgs, settings: Settings) -> Result<i32> {
    let registry = QueueRegistry::new(default_queues(), default_task_table())?;
    let concurrency = args
        .concurrency
        .map(|n| n as usize)
        .unwrap_or(settings.worker.concurrency);

    worker::run_worker(
        Arc::new(registry),
        Arc::new(settings),
        concurrency,
        shutdown_signal(),
    )
    .await?;
    Ok(0)
}

/// Log a health snapshot; exits non-zero when the database or cache is
/// unreachable.
async fn print_health(settings: &Settings) -> Result<i32> {
    // This process is not the worker, so it cannot vouch for it.
    let health = probe_system_health(settings, HealthStatus::Offline).await;

    info!(
        app = %health.app,
        version = %health.version,
        database = %health.database_status,
        cache = %health.cache_status,
        worker = %health.worker_status,
        "system health"
    );

    let reachable = health.database_status == HealthStatus::Online
        && health.cache_status == HealthStatus::Online;
    Ok(if reachable { 0 } else { 1 })
}
