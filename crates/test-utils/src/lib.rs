//! Shared helpers for the `stackctl` integration tests.

pub mod builders;
pub mod fake_launcher;
pub mod log_capture;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

pub use log_capture::{capture_logs, LogCapture};

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install a global subscriber writing through the test harness.
///
/// Output only shows for failing tests unless run with `--nocapture`.
/// `RUST_LOG` overrides the default `stackctl=info` filter.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("stackctl=info,stackctl_test_utils=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_TIMEOUT:?}"),
    }
}
