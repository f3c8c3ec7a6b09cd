// src/orchestrator/signal.rs

use std::future::Future;

use tracing::warn;

/// Listen for Ctrl-C, and SIGTERM on unix; the returned future resolves on
/// the first of them.
///
/// The handlers are installed by this call, not on first poll, so a signal
/// that arrives while children are still being started is not lost to the
/// default action. Must be called inside a tokio runtime. If a handler
/// cannot be installed that source is ignored and the other one still
/// works.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())
            .inspect_err(|e| warn!(error = %e, "failed to listen for SIGINT"))
            .ok();
        let mut terminate = signal(SignalKind::terminate())
            .inspect_err(|e| warn!(error = %e, "failed to listen for SIGTERM"))
            .ok();

        async move {
            let on_interrupt = async {
                match interrupt.as_mut() {
                    Some(stream) => {
                        stream.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };
            let on_terminate = async {
                match terminate.as_mut() {
                    Some(stream) => {
                        stream.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = on_interrupt => {}
                _ = on_terminate => {}
            }
        }
    }

    #[cfg(not(unix))]
    {
        let mut ctrl_c = tokio::signal::windows::ctrl_c()
            .inspect_err(|e| warn!(error = %e, "failed to listen for Ctrl+C"))
            .ok();

        async move {
            match ctrl_c.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        }
    }
}
