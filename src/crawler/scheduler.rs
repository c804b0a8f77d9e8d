//! Retry scheduling for single page fetches
//!
//! This module handles:
//! - Bounded retries of transient fetch failures
//! - Exponential backoff capped at a maximum delay
//! - Honouring server-requested waits (`Retry-After`), up to a ceiling
//! - Adding the fingerprint's delay hint to each backoff
//! - Interrupting attempts and sleeps on cancellation

use crate::state::FetchOutcome;
use crate::ConfigError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Longest server-requested wait that is honoured
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Bounds and pacing for retries of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Backoff after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound on the computed backoff
    pub max_delay: Duration,

    /// Growth factor applied per failed attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Checks the policy bounds
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if `max_attempts` is zero, the
    /// multiplier is below 1.0 or not finite, or `base_delay` exceeds `max_delay`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts < 1 {
            return Err(ConfigError::Validation(
                "max-attempts must be at least 1".to_string(),
            ));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "backoff-multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }

        if self.base_delay > self.max_delay {
            return Err(ConfigError::Validation(format!(
                "base-delay ({:?}) must not exceed max-delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }

        Ok(())
    }

    /// Backoff after failed attempt `attempt` (1-based)
    ///
    /// `min(base_delay * backoff_multiplier^(attempt-1), max_delay)`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.base_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = nanos.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.max(0.0) as u64)
    }
}

/// What one attempt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    pub outcome: FetchOutcome,

    /// Delay hint of the fingerprint the attempt used
    pub delay_hint: Duration,
}

impl AttemptResult {
    pub fn new(outcome: FetchOutcome, delay_hint: Duration) -> Self {
        Self {
            outcome,
            delay_hint,
        }
    }
}

impl From<FetchOutcome> for AttemptResult {
    fn from(outcome: FetchOutcome) -> Self {
        Self::new(outcome, Duration::ZERO)
    }
}

/// The scrape was cancelled while a fetch was in progress or backing off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("fetch cancelled")]
pub struct Cancelled;

/// Runs fetch attempts under a retry policy
pub struct RetryScheduler {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `policy` - The retry policy, validated here
    /// * `cancel` - Token that interrupts attempts and backoff sleeps
    ///
    /// # Returns
    ///
    /// * `Ok(RetryScheduler)` - The policy is valid
    /// * `Err(ConfigError)` - The policy is out of bounds
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self { policy, cancel })
    }

    /// Executes `attempt` until it succeeds, fails permanently, or runs out of attempts
    ///
    /// The closure receives the 1-based attempt index. Success and permanent
    /// failures are returned as soon as they happen. After a transient
    /// failure the scheduler sleeps for the policy backoff (floored by any
    /// `Retry-After`, itself capped at [`MAX_RETRY_AFTER`]) plus the
    /// attempt's delay hint, then tries again. When
    /// the attempts run out, the last transient failure is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome)` - The final outcome
    /// * `Err(Cancelled)` - The cancellation token fired
    pub async fn execute<F, Fut>(&self, mut attempt: F) -> Result<FetchOutcome, Cancelled>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult>,
    {
        let mut index = 1u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                result = attempt(index) => result,
            };

            match result.outcome {
                FetchOutcome::TransientFailure(reason) if index < self.policy.max_attempts => {
                    let backoff = self.policy.backoff_for(index);
                    let backoff = match reason.retry_after() {
                        Some(requested) => backoff.max(requested.min(MAX_RETRY_AFTER)),
                        None => backoff,
                    };
                    let delay = backoff.saturating_add(result.delay_hint);

                    tracing::warn!(
                        attempt = index,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Transient fetch failure, retrying after backoff"
                    );

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }

                    index += 1;
                }
                outcome => {
                    if outcome.is_transient() {
                        tracing::debug!(
                            "Giving up after {} attempts: {:?}",
                            index,
                            outcome.failure_reason()
                        );
                    }
                    return Ok(outcome);
                }
            }
        }
    }
}
