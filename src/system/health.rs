// src/system/health.rs

use std::fmt;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::config::Settings;

/// Online/offline status of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Online,
    Offline,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Online => "online",
            HealthStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health of the stack. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemHealth {
    pub database_status: HealthStatus,
    pub cache_status: HealthStatus,
    pub worker_status: HealthStatus,
    pub app: String,
    pub version: String,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        [self.database_status, self.cache_status, self.worker_status]
            .iter()
            .all(|s| *s == HealthStatus::Online)
    }
}

/// Probe database and cache reachability; the worker status is supplied by
/// the caller because only the worker process knows it is running.
pub async fn probe_system_health(settings: &Settings, worker_status: HealthStatus) -> SystemHealth {
    let limit = settings.redis.socket_connect_timeout;
    let (database_status, cache_status) = tokio::join!(
        probe_tcp(&settings.db.url, limit),
        probe_tcp(&settings.redis.url, limit),
    );

    SystemHealth {
        database_status,
        cache_status,
        worker_status,
        app: settings.app.name.clone(),
        version: settings.app.build_number.clone(),
    }
}

/// Try a TCP connect to the URL's host and port within `limit`.
pub async fn probe_tcp(url: &Url, limit: Duration) -> HealthStatus {
    let Some(host) = url.host_str() else {
        return HealthStatus::Offline;
    };
    let Some(port) = url.port().or_else(|| default_port(url.scheme())) else {
        debug!(scheme = url.scheme(), "no port known for scheme; reporting offline");
        return HealthStatus::Offline;
    };

    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => HealthStatus::Online,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "health probe connect failed");
            HealthStatus::Offline
        }
        Err(_) => {
            debug!(host, port, "health probe timed out");
            HealthStatus::Offline
        }
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    // Driver suffixes such as `postgresql+asyncpg` share the base default.
    let base = scheme.split('+').next().unwrap_or(scheme);
    match base {
        "postgres" | "postgresql" => Some(5432),
        "mysql" | "mariadb" => Some(3306),
        "redis" | "rediss" => Some(6379),
        _ => None,
    }
}
