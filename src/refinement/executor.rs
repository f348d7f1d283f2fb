//! # Predicate Executor
//!
//! Runs a predicate under a deadline with bounded exponential-backoff retries.
//!
//! Each execution owns an [`ExecutionToken`] and an [`ArmedTimer`] that cancels
//! it at the deadline. Attempts run `0..=max_retries`; a failed attempt waits
//! `100ms * 2^attempt` before the next one. The token is checked at the top of
//! every attempt and raced against the in-flight predicate and the backoff
//! sleep, so nothing is retried once the deadline passes. The timer is disarmed
//! on every exit path.

use super::cancellation::{ArmedTimer, ExecutionToken};
use super::predicate::SharedPredicate;
use crate::constants::refinement::BACKOFF_BASE_MS;
use crate::error::{AbortReason, RefinementError};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Effective limits for one execution
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Caller-owned token linked into the execution token
    pub parent: Option<CancellationToken>,
}

impl ExecutionPlan {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<CancellationToken>) -> Self {
        self.parent = parent;
        self
    }
}

/// Delay before retrying after the failed attempt `attempt` (0-based)
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor))
}

/// Executes a predicate with timeout, retries, and cancellation
#[derive(Clone)]
pub struct PredicateExecutor {
    predicate: SharedPredicate,
}

impl fmt::Debug for PredicateExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateExecutor").finish_non_exhaustive()
    }
}

impl PredicateExecutor {
    pub fn new(predicate: SharedPredicate) -> Self {
        Self { predicate }
    }

    /// Run the predicate against `value`, returning its verdict
    pub async fn execute(&self, value: &Value, plan: &ExecutionPlan) -> Result<bool, RefinementError> {
        let token = ExecutionToken::linked(plan.parent.as_ref());
        let timer = ArmedTimer::arm(token.clone(), plan.timeout);

        let result = self.run_attempts(value, &token, plan.max_retries).await;

        timer.disarm();
        result
    }

    async fn run_attempts(
        &self,
        value: &Value,
        token: &ExecutionToken,
        max_retries: u32,
    ) -> Result<bool, RefinementError> {
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                return Err(aborted(token));
            }

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(aborted(token)),
                outcome = self.predicate.check(value, token.observer()) => outcome,
            };

            match outcome {
                Ok(passed) => {
                    debug!(attempt = attempt, passed = passed, "Predicate settled");
                    return Ok(passed);
                }
                Err(error) => {
                    let error = RefinementError::predicate(&error);
                    if attempt >= max_retries || token.is_cancelled() {
                        warn!(
                            attempt = attempt,
                            max_retries = max_retries,
                            error = %error,
                            "Predicate failed with no retries remaining"
                        );
                        return Err(error);
                    }

                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Predicate failed, retrying after backoff"
                    );

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

fn aborted(token: &ExecutionToken) -> RefinementError {
    RefinementError::Aborted {
        reason: token.reason().unwrap_or(AbortReason::External),
    }
}
