// src/supervisor/spawn.rs

//! Launching the long-running children of `run-all`.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::cli::LogLevel;
use crate::config::Settings;
use crate::errors::{Result, StackError};
use crate::supervisor::output::{drain_stderr, forward_stdout};
use crate::supervisor::process::SupervisedProcess;
use crate::types::ProcessRole;

/// Start `serve worker` by re-executing the current binary.
///
/// The worker inherits stdio. `log_level` is forwarded so both processes
/// log at the same level.
pub fn start_worker(settings: &Settings, log_level: Option<LogLevel>) -> Result<SupervisedProcess> {
    let exe = std::env::current_exe().map_err(|source| StackError::ProcessSpawn {
        role: ProcessRole::Worker,
        source,
    })?;
    start_worker_with(&exe, settings, log_level)
}

/// Like [`start_worker`], but runs `program` instead of the current binary.
pub fn start_worker_with(
    program: &Path,
    settings: &Settings,
    log_level: Option<LogLevel>,
) -> Result<SupervisedProcess> {
    let role = ProcessRole::Worker;
    let mut cmd = Command::new(program);
    if let Some(level) = log_level {
        cmd.arg("--log-level").arg(level.as_arg());
    }
    cmd.arg("serve")
        .arg("worker")
        .arg("--concurrency")
        .arg(settings.worker.concurrency.to_string());

    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|source| StackError::ProcessSpawn { role, source })?;

    info!(
        role = %role,
        pid = ?child.id(),
        program = %program.display(),
        concurrency = settings.worker.concurrency,
        "worker process started"
    );

    Ok(SupervisedProcess::new(role, child, settings.supervisor.terminate_timeout))
}

/// Start `ASSET_RUN_COMMAND` through the platform shell.
///
/// Each stdout line is logged at info with `event = LOG_ASSET_EVENT`;
/// stderr is drained at debug. On unix the shell gets its own process
/// group so that termination reaches the bundler it launches.
pub fn start_asset_dev_server(settings: &Settings) -> Result<SupervisedProcess> {
    let role = ProcessRole::AssetDevServer;
    let command_line = &settings.app.asset_run_command;

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|source| StackError::ProcessSpawn { role, source })?;

    info!(
        role = %role,
        pid = ?child.id(),
        cmd = %command_line,
        "asset dev-server started"
    );

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut process = SupervisedProcess::new(role, child, settings.supervisor.terminate_timeout);
    if cfg!(unix) {
        process = process.with_process_group();
    }
    if let Some(stdout) = stdout {
        process =
            process.with_output_task(forward_stdout(stdout, role, settings.log.asset_event.clone()));
    }
    if let Some(stderr) = stderr {
        process = process.with_output_task(drain_stderr(stderr, role));
    }

    Ok(process)
}
