//! Validated, immutable run configuration

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;
use crate::timer::Backoff;

/// Everything the controller needs to drive one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Opaque reference to the unit of work, passed unchanged to the executor
    pub spec_path: PathBuf,

    /// Upper bound on attempts, always >= 1
    pub max_iterations: u32,

    /// Pacing between attempts
    pub backoff: Backoff,
}

impl RunConfig {
    pub fn new(spec_path: PathBuf, max_iterations: u32, backoff: Backoff) -> Result<Self, ConfigError> {
        debug!(?spec_path, max_iterations, ?backoff, "RunConfig::new: called");
        if max_iterations < 1 {
            return Err(ConfigError::MaxIterations(max_iterations));
        }
        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return Err(ConfigError::BackoffMultiplier(backoff.multiplier));
        }

        Ok(Self {
            spec_path,
            max_iterations,
            backoff,
        })
    }

    /// Delay to wait after the given attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay_after(attempt)
    }
}
