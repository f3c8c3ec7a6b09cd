// tests/shutdown_signal.rs

#![cfg(unix)]

mod common;
use crate::common::with_timeout;

use std::error::Error;

use stackctl::orchestrator::shutdown_signal;

type TestResult = Result<(), Box<dyn Error>>;

// Kept in its own test binary: the signal goes to the whole test process.
#[tokio::test]
async fn sigterm_sent_before_the_first_poll_is_caught() -> TestResult {
    let shutdown = shutdown_signal();

    // Without the handler already in place this would kill the test run.
    let status = tokio::process::Command::new("kill")
        .arg("-TERM")
        .arg(std::process::id().to_string())
        .status()
        .await?;
    assert!(status.success());

    with_timeout(shutdown).await;
    Ok(())
}
