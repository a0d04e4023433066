//! Error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration, detected before the loop is entered
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max-iterations must be at least 1 (got {0})")]
    MaxIterations(u32),

    #[error("backoff-multiplier must be a finite value >= 1.0 (got {0})")]
    BackoffMultiplier(f64),

    #[error("executor command is empty")]
    EmptyCommand,

    #[error("Failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures raised while talking to the external executor
///
/// These never reach the controller directly: the adapter folds them into an
/// `ExecutionOutcome` through its classification policy.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Executor timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutorError::Timeout(_))
    }
}
