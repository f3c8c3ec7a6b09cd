// src/config/overrides.rs

//! Command-line overrides for `serve run-all`.
//!
//! Precedence for every overridable field:
//! 1. explicit CLI flag
//! 2. value from [`Settings`]
//! 3. built-in default (already folded into `Settings` by the loader)
//!
//! Boolean switches (`--reload`, `--debug`, `--verbose`) can only turn a
//! behaviour on; leaving a flag off keeps whatever the settings say.

use crate::cli::RunAllArgs;
use crate::config::model::Settings;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAllOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub http_workers: Option<usize>,
    pub worker_concurrency: Option<usize>,
    pub reload: bool,
    pub verbose: bool,
    pub debug: bool,
}

impl Settings {
    /// Return a copy of these settings with `overrides` applied.
    pub fn with_overrides(&self, overrides: &RunAllOverrides) -> Settings {
        let mut merged = self.clone();

        if let Some(host) = &overrides.host {
            merged.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            merged.server.port = port;
        }
        if let Some(workers) = overrides.http_workers {
            merged.server.http_workers = Some(workers);
        }
        if let Some(concurrency) = overrides.worker_concurrency {
            merged.worker.concurrency = concurrency;
        }
        if overrides.reload {
            merged.server.reload = Some(true);
        }

        merged.app.debug = overrides.debug || merged.app.debug;
        if overrides.verbose || overrides.debug {
            merged.log.level = tracing::Level::DEBUG;
        }

        merged
    }
}

impl From<&RunAllArgs> for RunAllOverrides {
    fn from(args: &RunAllArgs) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            http_workers: args.http_workers.map(|n| n as usize),
            worker_concurrency: args.worker_concurrency.map(|n| n as usize),
            reload: args.reload,
            verbose: args.verbose,
            debug: args.debug,
        }
    }
}
