// src/logging.rs

//! Logging setup for `stackctl` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `--verbose` / `--debug` (forces `debug`)
//! 3. `STACKCTL_LOG` environment variable (e.g. "info", "debug")
//! 4. `LOG_LEVEL` from settings (stdlib numbers: 10, 20, 30, ...)
//! 5. default to `info`
//!
//! Logs are sent to STDERR; child processes inherit stdout.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no flag sets the level.
pub const LOG_ENV_VAR: &str = "STACKCTL_LOG";

/// Inputs for [`resolve_level`], gathered from CLI and settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLevelSources {
    pub cli_level: Option<LogLevel>,
    pub verbose: bool,
    pub settings_level: Option<tracing::Level>,
}

/// Initialise global logging subscriber and return the level it uses.
///
/// Safe to call once at startup.
pub fn init_logging(sources: LogLevelSources) -> Result<tracing::Level> {
    let env_level = std::env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|s| parse_level_str(&s));
    let level = resolve_level(sources, env_level);

    // Send logs to stderr; stdout belongs to the foreground server.
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))?;

    Ok(level)
}

/// Pick the effective level following the module-level priority list.
pub fn resolve_level(sources: LogLevelSources, env_level: Option<tracing::Level>) -> tracing::Level {
    if let Some(lvl) = sources.cli_level {
        return level_from_log_level(lvl);
    }
    if sources.verbose {
        return tracing::Level::DEBUG;
    }
    env_level
        .or(sources.settings_level)
        .unwrap_or(tracing::Level::INFO)
}

/// Map a tracing level back to the CLI enum (used to forward the level to
/// child processes).
pub fn log_level_from_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
