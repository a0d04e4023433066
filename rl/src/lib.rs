//! ralphloop - bounded iteration controller
//!
//! Runs an external worker against a fixed spec file up to N times, pausing
//! between attempts, until the worker succeeds, fails fatally, the budget runs
//! out, or the operator interrupts.
//!
//! # Modules
//!
//! - [`r#loop`] - Iteration controller and run configuration
//! - [`executor`] - Worker invocation and outcome classification
//! - [`timer`] - Interruptible delay and backoff
//! - [`signal`] - Cancellation flag and OS interrupt wiring
//! - [`report`] - Status lines
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod report;
pub mod signal;
pub mod timer;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, ExecutorError};
pub use executor::{Classification, ClassificationPolicy, CommandExecutor, CommandSpec, ExecutionOutcome, Executor};
pub use r#loop::{FinalStatus, IterationController, RunConfig, RunStatus};
pub use report::{ConsoleReporter, NullReporter, Reporter};
pub use signal::CancelSignal;
pub use timer::{Backoff, DelayTimer, TokioTimer, WaitOutcome};

/// Exit code for a configuration rejected before the loop starts (EX_CONFIG)
pub const CONFIG_ERROR_EXIT_CODE: i32 = 78;
