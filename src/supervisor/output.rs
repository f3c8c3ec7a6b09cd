// src/supervisor/output.rs

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::types::ProcessRole;

/// Log every stdout line of a child at info, tagged with `event`.
///
/// The task ends at EOF, which happens once the child (and anything else
/// holding the pipe) has exited.
pub(crate) fn forward_stdout<R>(reader: R, role: ProcessRole, event: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!(event = %event, role = %role, "{}", line),
                Ok(None) => break,
                Err(e) => {
                    debug!(role = %role, error = %e, "stdout read failed; stopping forwarder");
                    break;
                }
            }
        }
        debug!(role = %role, "stdout forwarder finished");
    })
}

/// Drain stderr so the pipe never fills; lines are logged at debug.
pub(crate) fn drain_stderr<R>(reader: R, role: ProcessRole) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(role = %role, "stderr: {}", line);
        }
    })
}
