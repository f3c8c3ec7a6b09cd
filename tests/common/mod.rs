#![allow(dead_code)]

pub use stackctl_test_utils::builders::{SettingsBuilder, TEST_SECRET};
pub use stackctl_test_utils::{capture_logs, init_tracing, with_timeout};

use std::time::Duration;

/// Poll `check` every 20ms until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
