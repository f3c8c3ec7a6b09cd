// src/supervisor/process.rs

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, StackError};
use crate::types::{BoxFuture, ProcessRole};

/// How long `terminate` waits for output forwarders to reach EOF.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Exit code reported for a child that died from a signal.
pub const SIGNALLED_EXIT_CODE: i32 = 1;

/// A child the orchestrator started and must stop again.
pub trait ChildProcess: Send {
    fn role(&self) -> ProcessRole;

    /// Wait for the child to exit on its own and return its exit code.
    ///
    /// Dropping the future leaves the child running, so it can still be
    /// stopped with [`ChildProcess::terminate`].
    fn wait(&mut self) -> BoxFuture<'_, Result<i32>>;

    /// Stop the child. Calling this again after it returned is a no-op.
    fn terminate(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// An OS child process tagged with its role.
///
/// Spawned with `kill_on_drop(true)`, so dropping it without `terminate`
/// still kills the child.
pub struct SupervisedProcess {
    role: ProcessRole,
    child: Option<Child>,
    pid: Option<u32>,
    terminate_timeout: Duration,
    /// Signal the child's whole process group instead of just the child.
    signal_group: bool,
    output_tasks: Vec<JoinHandle<()>>,
}

impl SupervisedProcess {
    pub(crate) fn new(role: ProcessRole, child: Child, terminate_timeout: Duration) -> Self {
        let pid = child.id();
        Self {
            role,
            child: Some(child),
            pid,
            terminate_timeout,
            signal_group: false,
            output_tasks: Vec::new(),
        }
    }

    pub(crate) fn with_process_group(mut self) -> Self {
        self.signal_group = true;
        self
    }

    pub(crate) fn with_output_task(mut self, task: JoinHandle<()>) -> Self {
        self.output_tasks.push(task);
        self
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    /// OS process id, as recorded at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True once `terminate` has run.
    pub fn is_terminated(&self) -> bool {
        self.child.is_none()
    }

    /// Wait until the child exits; a death by signal maps to
    /// [`SIGNALLED_EXIT_CODE`].
    pub async fn wait(&mut self) -> Result<i32> {
        let role = self.role;
        let Some(child) = self.child.as_mut() else {
            return Err(StackError::Other(anyhow::anyhow!(
                "{role} was already terminated"
            )));
        };
        let status = child.wait().await?;
        Ok(exit_code(role, status))
    }

    /// Send SIGTERM, wait up to the terminate timeout, then kill.
    ///
    /// Idempotent: later calls return `Ok(())` without touching the OS.
    pub async fn terminate(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            debug!(role = %self.role, "terminate called on already terminated process");
            return Ok(());
        };

        let stop = StopRequest {
            role: self.role,
            pid: self.pid,
            timeout: self.terminate_timeout,
            signal_group: self.signal_group,
        };
        let result = stop.run(&mut child).await;

        for mut task in self.output_tasks.drain(..) {
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut task).await.is_err() {
                task.abort();
            }
        }

        result
    }
}

/// Everything `terminate` needs once the child has been taken out.
struct StopRequest {
    role: ProcessRole,
    pid: Option<u32>,
    timeout: Duration,
    signal_group: bool,
}

impl StopRequest {
    async fn run(&self, child: &mut Child) -> Result<()> {
        let role = self.role;
        let exited = child
            .try_wait()
            .map_err(|source| StackError::ChildTermination { role, source })?;
        if let Some(status) = exited {
            info!(role = %role, pid = ?self.pid, %status, "process had already exited");
            return Ok(());
        }

        info!(role = %role, pid = ?self.pid, "terminating process");

        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                self.send_sigterm(pid)?;
                match tokio::time::timeout(self.timeout, child.wait()).await {
                    Ok(Ok(status)) => {
                        info!(role = %role, pid, %status, "process exited after SIGTERM");
                        return Ok(());
                    }
                    Ok(Err(source)) => return Err(StackError::ChildTermination { role, source }),
                    Err(_) => {
                        warn!(
                            role = %role,
                            pid,
                            timeout_secs = self.timeout.as_secs_f64(),
                            "process did not exit after SIGTERM; killing"
                        );
                    }
                }
            }
        }

        // `Child::kill` only reaches the group leader; take the rest of the
        // group down with it.
        #[cfg(unix)]
        {
            if let (true, Some(pid)) = (self.signal_group, self.pid) {
                self.send_signal(pid, nix::sys::signal::Signal::SIGKILL)?;
            }
        }

        child
            .kill()
            .await
            .map_err(|source| StackError::ChildTermination { role, source })?;
        info!(role = %role, pid = ?self.pid, "process killed");
        Ok(())
    }

    #[cfg(unix)]
    fn send_sigterm(&self, pid: u32) -> Result<()> {
        self.send_signal(pid, nix::sys::signal::Signal::SIGTERM)
    }

    /// Signal the child, or its whole process group when it leads one.
    #[cfg(unix)]
    fn send_signal(&self, pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, killpg};
        use nix::unistd::Pid;

        let target = Pid::from_raw(pid as i32);
        let sent = if self.signal_group {
            killpg(target, signal)
        } else {
            kill(target, signal)
        };

        match sent {
            // Exited between `try_wait` and now; `wait` will reap it.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(StackError::ChildTermination {
                role: self.role,
                source: std::io::Error::from(errno),
            }),
        }
    }
}

fn exit_code(role: ProcessRole, status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => {
            info!(role = %role, exit_code = code, success = status.success(), "process exited");
            code
        }
        None => {
            warn!(role = %role, %status, "process terminated by signal");
            SIGNALLED_EXIT_CODE
        }
    }
}

impl ChildProcess for SupervisedProcess {
    fn role(&self) -> ProcessRole {
        self.role
    }

    fn wait(&mut self) -> BoxFuture<'_, Result<i32>> {
        Box::pin(SupervisedProcess::wait(self))
    }

    fn terminate(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(SupervisedProcess::terminate(self))
    }
}

impl std::fmt::Debug for SupervisedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("role", &self.role)
            .field("pid", &self.pid)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
