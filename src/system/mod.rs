// src/system/mod.rs

//! System-level reporting (health snapshots).

pub mod health;

pub use health::{probe_system_health, HealthStatus, SystemHealth};
