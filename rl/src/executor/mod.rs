//! Executor adapter - bridges the controller to the external task executor
//!
//! One invocation per attempt. Whatever the external executor does, the
//! adapter hands back exactly one [`ExecutionOutcome`].

mod command;
mod policy;

pub use command::{CommandExecutor, CommandSpec};
pub use policy::{ClassificationPolicy, ProcessExit};

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

/// Classification of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    RetryableFailure,
    FatalFailure,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::RetryableFailure => write!(f, "retryable failure"),
            Self::FatalFailure => write!(f, "fatal failure"),
        }
    }
}

/// Result of one attempt, consumed by the controller and then dropped
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub classification: Classification,

    /// Diagnostic payload for the reporter; the controller never reads it
    pub detail: String,
}

impl ExecutionOutcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            classification: Classification::Success,
            detail: detail.into(),
        }
    }

    pub fn retryable(detail: impl Into<String>) -> Self {
        Self {
            classification: Classification::RetryableFailure,
            detail: detail.into(),
        }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        Self {
            classification: Classification::FatalFailure,
            detail: detail.into(),
        }
    }
}

/// Runs the unit of work once
#[async_trait]
pub trait Executor: Send + Sync {
    /// Invoke the external executor for `attempt` against `spec_path`
    ///
    /// Must not fail: every error is folded into the returned outcome.
    async fn invoke(&self, spec_path: &Path, attempt: u32) -> ExecutionOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        assert_eq!(ExecutionOutcome::success("ok").classification, Classification::Success);
        assert_eq!(
            ExecutionOutcome::retryable("again").classification,
            Classification::RetryableFailure
        );

        let fatal = ExecutionOutcome::fatal("boom");
        assert_eq!(fatal.classification, Classification::FatalFailure);
        assert_eq!(fatal.detail, "boom");
    }

    #[test]
    fn test_classification_display() {
        assert_eq!(Classification::Success.to_string(), "success");
        assert_eq!(Classification::RetryableFailure.to_string(), "retryable failure");
        assert_eq!(Classification::FatalFailure.to_string(), "fatal failure");
    }
}
