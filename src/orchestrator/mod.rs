// src/orchestrator/mod.rs

//! `serve run-all` lifecycle.
//!
//! - [`core`] is the state machine that starts children in order and tears
//!   them down on every exit path.
//! - [`launcher`] is the `ProcessLauncher` seam plus the production
//!   `RealLauncher`.
//! - [`signal`] turns Ctrl-C / SIGTERM into a shutdown future.

pub mod core;
pub mod launcher;
pub mod signal;

pub use self::core::{
    Orchestrator, OrchestratorState, RunReport, ShutdownTrigger, INTERRUPTED_EXIT_CODE,
    SPAWN_FAILED_EXIT_CODE,
};
pub use launcher::{ProcessLauncher, RealLauncher};
pub use signal::shutdown_signal;
