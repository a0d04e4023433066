//! Outcome classification policy

use tracing::debug;

use crate::error::ExecutorError;

use super::{Classification, ExecutionOutcome};

/// What the external process reported back
#[derive(Debug, Clone)]
pub struct ProcessExit {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Maps executor results onto the three classifications
///
/// Anything not explicitly recognised as success or transient is fatal.
#[derive(Debug, Clone)]
pub struct ClassificationPolicy {
    pub success_exit_code: i32,

    /// Exit codes the executor uses to signal a transient condition
    pub retryable_exit_codes: Vec<i32>,

    /// When set, a successful exit only counts if stdout contains this marker
    pub completion_marker: Option<String>,

    pub retry_on_timeout: bool,

    /// Output kept in the outcome detail
    pub max_detail_chars: usize,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            success_exit_code: 0,
            retryable_exit_codes: vec![75], // EX_TEMPFAIL
            completion_marker: None,
            retry_on_timeout: false,
            max_detail_chars: 2000,
        }
    }
}

impl ClassificationPolicy {
    /// Classify a process that ran to exit
    pub fn classify_exit(&self, exit: &ProcessExit) -> ExecutionOutcome {
        debug!(exit_code = ?exit.exit_code, duration_ms = exit.duration_ms, "classify_exit: called");

        let classification = match exit.exit_code {
            Some(code) if code == self.success_exit_code => match &self.completion_marker {
                Some(marker) if !exit.stdout.contains(marker.as_str()) => {
                    debug!(%marker, "classify_exit: clean exit without completion marker");
                    Classification::RetryableFailure
                }
                _ => Classification::Success,
            },
            Some(code) if self.retryable_exit_codes.contains(&code) => Classification::RetryableFailure,
            _ => Classification::FatalFailure,
        };

        let status = match exit.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let output = if exit.stdout.trim().is_empty() { &exit.stderr } else { &exit.stdout };
        let detail = format!(
            "{} after {}ms\n{}",
            status,
            exit.duration_ms,
            truncate_tail(output.trim(), self.max_detail_chars)
        );

        ExecutionOutcome { classification, detail }
    }

    /// Classify a failure to run or finish the process
    pub fn classify_error(&self, err: &ExecutorError) -> ExecutionOutcome {
        debug!(error = %err, "classify_error: called");
        if err.is_timeout() && self.retry_on_timeout {
            ExecutionOutcome::retryable(err.to_string())
        } else {
            ExecutionOutcome::fatal(err.to_string())
        }
    }
}

/// Keep the last `max` chars; the end of the output is usually the useful part
fn truncate_tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let tail: String = s.chars().skip(count - max).collect();
    format!("[{} chars truncated]...{}", count - max, tail)
}
