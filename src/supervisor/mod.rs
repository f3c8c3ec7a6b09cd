// src/supervisor/mod.rs

//! Child process supervision for `serve run-all`.
//!
//! - [`process`] wraps a spawned child with its role and an idempotent
//!   `terminate`.
//! - [`spawn`] launches the worker and the asset dev-server.
//! - [`output`] forwards a child's output lines into the logger.
//! - [`server`] builds the HTTP server command line and starts it with
//!   inherited stdio.

pub mod output;
pub mod process;
pub mod server;
pub mod spawn;

pub use process::{ChildProcess, SupervisedProcess, SIGNALLED_EXIT_CODE};
pub use server::{run_server_foreground, start_http_server, ServerInvocation};
pub use spawn::{start_asset_dev_server, start_worker, start_worker_with};
