//! Delay timer - interruptible pause between attempts

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::signal::CancelSignal;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration elapsed
    Completed,
    /// Cancellation was observed before the duration elapsed
    Interrupted,
}

/// Suspends the loop between attempts
#[async_trait]
pub trait DelayTimer: Send + Sync {
    /// Wait for `duration`, returning early if `cancel` is requested
    async fn wait(&self, duration: Duration, cancel: &CancelSignal) -> WaitOutcome;
}

/// Timer backed by the tokio clock
///
/// The sleep races the cancellation notifier, so interruption latency does not
/// depend on the remaining duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl DelayTimer for TokioTimer {
    async fn wait(&self, duration: Duration, cancel: &CancelSignal) -> WaitOutcome {
        debug!(duration_ms = duration.as_millis() as u64, "TokioTimer::wait: called");

        // A zero delay still observes a cancellation raised at the same instant
        if cancel.is_requested() {
            debug!("TokioTimer::wait: already cancelled");
            return WaitOutcome::Interrupted;
        }
        if duration.is_zero() {
            return WaitOutcome::Completed;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                debug!("TokioTimer::wait: completed");
                WaitOutcome::Completed
            }
            _ = cancel.cancelled() => {
                debug!("TokioTimer::wait: interrupted");
                WaitOutcome::Interrupted
            }
        }
    }
}

/// Pacing between attempts
///
/// The wait after attempt `k` is `base * multiplier^(k-1)`, capped at `max`.
/// A multiplier of 1.0 gives a constant delay. When `max` is below `base` the
/// base delay takes precedence and the wait is always `base`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl Backoff {
    /// Constant delay between every attempt
    pub fn constant(delay: Duration) -> Self {
        Self {
            base: delay,
            multiplier: 1.0,
            max: delay,
        }
    }

    /// Delay to apply after the given (1-indexed) attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let cap = self.max.max(self.base);

        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
