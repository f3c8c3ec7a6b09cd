// src/config/mod.rs

//! Settings loading and validation.
//!
//! Responsibilities:
//! - Define the raw and validated settings model (`model.rs`).
//! - Read `.env` and the environment into `RawSettings` (`loader.rs`).
//! - Validate and convert into `Settings` (`validate.rs`).
//! - Merge `run-all` CLI flags over the loaded values (`overrides.rs`).

pub mod loader;
pub mod model;
pub mod overrides;
pub mod validate;

pub use loader::{load_raw, SettingsLoader};
pub use model::{RawSettings, SecretString, Settings};
pub use overrides::RunAllOverrides;
