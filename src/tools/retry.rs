//! Bounded retry with exponential backoff and a per-attempt timeout.
//!
//! [`with_retry`] is an explicit combinator: callers pass the operation and
//! the policy and get back either the value (with the attempts it took) or
//! the last error once the attempt ceiling is reached.

use std::future::Future;
use std::time::Duration;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::tools::action::ToolAction;

/// Which failures consume another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Every failure is retried until the ceiling.
    #[default]
    AllErrors,
    /// Only transport, timeout and 5xx/429 failures are retried.
    TransientOnly,
}

/// Retry settings for adapter calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempt ceiling, including the first call.
    pub max_attempts: u32,
    /// Base wait; doubled after each failed attempt.
    pub multiplier: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Bound on a single attempt. Elapsing counts as a failed attempt.
    pub attempt_timeout: Duration,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
            retry_on: RetryOn::AllErrors,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: Duration::ZERO,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            attempt_timeout: Duration::from_secs(5),
            retry_on: RetryOn::AllErrors,
        }
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based):
    /// `clamp(multiplier * 2^(attempt-1), min_wait, max_wait)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1u32 << exp);
        raw.clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }

    fn should_retry(&self, err: &AdapterError) -> bool {
        if err.kind == AdapterErrorKind::Unconfigured {
            return false;
        }
        match self.retry_on {
            RetryOn::AllErrors => true,
            RetryOn::TransientOnly => err.is_transient(),
        }
    }
}

/// A value plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// All attempts failed; carries the last error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{last} (after {attempts} attempt(s))")]
pub struct RetryExhausted {
    pub last: AdapterError,
    pub attempts: u32,
}

/// Run `op` under `policy`.
///
/// `op` receives the 1-based attempt number. Each attempt is bounded by
/// `policy.attempt_timeout`. Unconfigured-adapter errors are never retried.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    action: ToolAction,
    mut op: F,
) -> Result<Retried<T>, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let ceiling = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::timeout(
                action.tool(),
                action,
                policy.attempt_timeout,
            )),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(action = %action, attempts = attempt, "Tool call succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(err) => {
                if attempt >= ceiling || !policy.should_retry(&err) {
                    return Err(RetryExhausted {
                        last: err,
                        attempts: attempt,
                    });
                }
                let wait = policy.delay_for(attempt);
                tracing::warn!(
                    action = %action,
                    attempt,
                    max_attempts = ceiling,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "Tool call failed, retrying"
                );
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
