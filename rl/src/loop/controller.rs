//! IterationController - the bounded retry loop
//!
//! Each pass: invoke the executor, classify, check the budget, check for
//! cancellation, wait, then move on to the next attempt. The controller is the
//! only place the attempt counter changes or a terminal status is chosen.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::executor::{Classification, Executor};
use crate::report::{NullReporter, Reporter};
use crate::signal::CancelSignal;
use crate::timer::{DelayTimer, TokioTimer, WaitOutcome};

use super::RunConfig;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    ExhaustedIterations,
    Cancelled,
    FatalError,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Succeeded => 0,
            RunStatus::FatalError | RunStatus::Running => 1,
            RunStatus::ExhaustedIterations => 2,
            RunStatus::Cancelled => 130,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::ExhaustedIterations => write!(f, "exhausted iterations"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::FatalError => write!(f, "fatal error"),
        }
    }
}

/// Terminal status plus the attempt it was reached on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalStatus {
    pub status: RunStatus,
    pub attempt: u32,
}

/// Loop state, owned and mutated only by `IterationController::run`
#[derive(Debug)]
struct IterationState {
    attempt: u32,
    status: RunStatus,
}

/// Drives the executor until success, a fatal failure, an exhausted budget or
/// cancellation
pub struct IterationController {
    executor: Arc<dyn Executor>,
    timer: Arc<dyn DelayTimer>,
    reporter: Arc<dyn Reporter>,
    cancel: CancelSignal,
}

impl IterationController {
    /// Create a controller with the tokio timer and no reporting
    pub fn new(executor: Arc<dyn Executor>, cancel: CancelSignal) -> Self {
        debug!("IterationController::new: called");
        Self {
            executor,
            timer: Arc::new(TokioTimer),
            reporter: Arc::new(NullReporter),
            cancel,
        }
    }

    pub fn with_timer(mut self, timer: Arc<dyn DelayTimer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run the loop to a terminal status
    pub async fn run(&self, config: &RunConfig) -> Result<FinalStatus, ConfigError> {
        debug!(spec_path = ?config.spec_path, max_iterations = config.max_iterations, "run: called");
        if config.max_iterations < 1 {
            return Err(ConfigError::MaxIterations(config.max_iterations));
        }

        self.reporter.run_started(config);

        let mut state = IterationState {
            attempt: 1,
            status: RunStatus::Running,
        };

        while state.status == RunStatus::Running {
            info!("Attempt {}/{}", state.attempt, config.max_iterations);

            let outcome = self.executor.invoke(&config.spec_path, state.attempt).await;
            debug!(attempt = state.attempt, classification = ?outcome.classification, "run: attempt finished");
            self.reporter
                .iteration_finished(state.attempt, config.max_iterations, &outcome);

            match outcome.classification {
                Classification::Success => {
                    state.status = RunStatus::Succeeded;
                    continue;
                }
                Classification::FatalFailure => {
                    state.status = RunStatus::FatalError;
                    continue;
                }
                Classification::RetryableFailure => {}
            }

            if state.attempt >= config.max_iterations {
                debug!(attempt = state.attempt, "run: iteration budget exhausted");
                state.status = RunStatus::ExhaustedIterations;
                continue;
            }

            if self.cancel.is_requested() {
                debug!(attempt = state.attempt, "run: cancelled before wait");
                state.status = RunStatus::Cancelled;
                continue;
            }

            let delay = config.delay_after(state.attempt);
            self.reporter.waiting(state.attempt, delay);
            if self.timer.wait(delay, &self.cancel).await == WaitOutcome::Interrupted {
                debug!(attempt = state.attempt, "run: cancelled during wait");
                state.status = RunStatus::Cancelled;
                continue;
            }

            state.attempt += 1;
        }

        let final_status = FinalStatus {
            status: state.status,
            attempt: state.attempt,
        };
        if final_status.status == RunStatus::Succeeded {
            info!("Run succeeded on attempt {}", final_status.attempt);
        } else {
            warn!("Run ended {} on attempt {}", final_status.status, final_status.attempt);
        }
        self.reporter.run_finished(&final_status);

        Ok(final_status)
    }
}
