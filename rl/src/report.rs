//! Run reporter - human-readable status lines
//!
//! Reporting is best-effort: a failing sink never reaches the controller.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use colored::Colorize;
use tracing::{debug, info, warn};

use crate::executor::{Classification, ExecutionOutcome};
use crate::r#loop::{FinalStatus, RunConfig, RunStatus};

/// Observer of controller lifecycle events
pub trait Reporter: Send + Sync {
    fn run_started(&self, config: &RunConfig);

    fn iteration_finished(&self, attempt: u32, max_iterations: u32, outcome: &ExecutionOutcome);

    fn waiting(&self, attempt: u32, delay: Duration);

    fn run_finished(&self, status: &FinalStatus);
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn run_started(&self, _config: &RunConfig) {}
    fn iteration_finished(&self, _attempt: u32, _max_iterations: u32, _outcome: &ExecutionOutcome) {}
    fn waiting(&self, _attempt: u32, _delay: Duration) {}
    fn run_finished(&self, _status: &FinalStatus) {}
}

/// Line-oriented reporter writing to any sink (stdout by default)
pub struct ConsoleReporter {
    sink: Mutex<Box<dyn Write + Send>>,
    show_detail: bool,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
            show_detail: false,
        }
    }

    /// Also print the executor's diagnostic detail after each attempt
    pub fn with_detail(mut self, show_detail: bool) -> Self {
        self.show_detail = show_detail;
        self
    }

    fn emit(&self, line: &str) {
        let Ok(mut sink) = self.sink.lock() else {
            debug!("ConsoleReporter::emit: sink lock poisoned");
            return;
        };
        if let Err(e) = writeln!(sink, "{}", line).and_then(|_| sink.flush()) {
            debug!(error = %e, "ConsoleReporter::emit: write failed");
        }
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }
}

impl Reporter for ConsoleReporter {
    fn run_started(&self, config: &RunConfig) {
        info!(
            "Run started: spec={}, max_iterations={}, delay={:?}",
            config.spec_path.display(),
            config.max_iterations,
            config.backoff.base
        );
        self.emit(&format!(
            "[{}] {} spec={} max-iterations={} delay={:?}",
            Self::timestamp(),
            "Starting".cyan().bold(),
            config.spec_path.display(),
            config.max_iterations,
            config.backoff.base
        ));
    }

    fn iteration_finished(&self, attempt: u32, max_iterations: u32, outcome: &ExecutionOutcome) {
        let label = match outcome.classification {
            Classification::Success => outcome.classification.to_string().green(),
            Classification::RetryableFailure => outcome.classification.to_string().yellow(),
            Classification::FatalFailure => outcome.classification.to_string().red(),
        };
        info!("Attempt {}/{}: {}", attempt, max_iterations, outcome.classification);
        self.emit(&format!(
            "[{}] Attempt {}/{}: {}",
            Self::timestamp(),
            attempt,
            max_iterations,
            label
        ));

        if self.show_detail && !outcome.detail.is_empty() {
            for line in outcome.detail.lines() {
                self.emit(&format!("    {}", line.dimmed()));
            }
        }
    }

    fn waiting(&self, attempt: u32, delay: Duration) {
        debug!(attempt, delay_ms = delay.as_millis() as u64, "ConsoleReporter::waiting: called");
        if !delay.is_zero() {
            self.emit(&format!("[{}] Waiting {:?} before attempt {}", Self::timestamp(), delay, attempt + 1));
        }
    }

    fn run_finished(&self, status: &FinalStatus) {
        let label = match status.status {
            RunStatus::Succeeded => status.status.to_string().green().bold(),
            RunStatus::Cancelled | RunStatus::ExhaustedIterations => status.status.to_string().yellow().bold(),
            RunStatus::FatalError | RunStatus::Running => status.status.to_string().red().bold(),
        };
        if status.status == RunStatus::Succeeded {
            info!("Run finished: {} after {} attempt(s)", status.status, status.attempt);
        } else {
            warn!("Run finished: {} after {} attempt(s)", status.status, status.attempt);
        }
        self.emit(&format!(
            "[{}] Finished: {} after {} attempt(s)",
            Self::timestamp(),
            label,
            status.attempt
        ));
    }
}
