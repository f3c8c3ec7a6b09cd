// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::ProcessRole;

#[derive(Error, Debug)]
pub enum StackError {
    /// Invalid or missing settings. Fatal before any process starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A supervisor could not launch its subprocess.
    #[error("failed to spawn {role} process: {source}")]
    ProcessSpawn {
        role: ProcessRole,
        #[source]
        source: std::io::Error,
    },

    /// Terminating a child during shutdown failed. Logged, never re-raised.
    #[error("failed to terminate {role} process: {source}")]
    ChildTermination {
        role: ProcessRole,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue registration error: {0}")]
    QueueRegistration(String),

    #[error("Enqueue error: {0}")]
    Enqueue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackError {
    /// Process exit code used by `main` for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            StackError::Configuration(_) => 2,
            _ => 1,
        }
    }
}

impl From<config::ConfigError> for StackError {
    fn from(err: config::ConfigError) -> Self {
        StackError::Configuration(err.to_string())
    }
}

impl From<dotenvy::Error> for StackError {
    fn from(err: dotenvy::Error) -> Self {
        StackError::Configuration(format!("reading .env file: {err}"))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StackError>;
