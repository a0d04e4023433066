//! Iteration control for ralphloop
//!
//! The controller runs one attempt at a time against the spec, pacing retries
//! and stopping on success, fatal failure, an exhausted budget or cancellation.

mod config;
mod controller;

pub use config::RunConfig;
pub use controller::{FinalStatus, IterationController, RunStatus};
