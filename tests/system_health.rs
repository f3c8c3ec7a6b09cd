// tests/system_health.rs

mod common;
use crate::common::{with_timeout, SettingsBuilder};

use std::error::Error;
use std::time::Duration;

use tokio::net::TcpListener;
use url::Url;

use stackctl::system::health::probe_tcp;
use stackctl::system::{probe_system_health, HealthStatus};

type TestResult = Result<(), Box<dyn Error>>;

/// A port on localhost that nothing listens on.
async fn closed_port() -> Result<u16, Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[tokio::test]
async fn listening_endpoints_are_online() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let settings = SettingsBuilder::new()
        .app_name("Billing")
        .db_url(&format!("postgresql+asyncpg://app:pw@127.0.0.1:{port}/app"))
        .redis_url(&format!("redis://127.0.0.1:{port}/0"))
        .build();

    let health = with_timeout(probe_system_health(&settings, HealthStatus::Online)).await;
    assert_eq!(health.database_status, HealthStatus::Online);
    assert_eq!(health.cache_status, HealthStatus::Online);
    assert_eq!(health.worker_status, HealthStatus::Online);
    assert_eq!(health.app, "Billing");
    assert!(health.is_healthy());
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoints_are_offline() -> TestResult {
    let port = closed_port().await?;
    let settings = SettingsBuilder::new()
        .db_url(&format!("postgresql://127.0.0.1:{port}/app"))
        .redis_url(&format!("redis://127.0.0.1:{port}"))
        .connect_timeout_secs(1)
        .build();

    let health = with_timeout(probe_system_health(&settings, HealthStatus::Offline)).await;
    assert_eq!(health.database_status, HealthStatus::Offline);
    assert_eq!(health.cache_status, HealthStatus::Offline);
    assert!(!health.is_healthy());
    Ok(())
}

#[tokio::test]
async fn unknown_scheme_without_port_is_offline() -> TestResult {
    let url = Url::parse("custom://127.0.0.1/db")?;
    assert_eq!(
        probe_tcp(&url, Duration::from_millis(200)).await,
        HealthStatus::Offline
    );
    Ok(())
}

#[test]
fn status_renders_lowercase() {
    assert_eq!(HealthStatus::Online.to_string(), "online");
    assert_eq!(HealthStatus::Offline.as_str(), "offline");
}
