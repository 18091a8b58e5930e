//! Bounded retry with exponential backoff around external calls.
//!
//! Every attempt runs under a timeout; exceeding it is treated like any other
//! transient failure. Only [`SignalError::is_retryable`] errors are retried.

use crate::error::{SignalError, Stage};
use std::future::Future;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`: `base * 2^(attempt - 1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Failed { attempts: u32, last_error: SignalError },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Succeeded { value, .. } => Some(value),
            Self::Failed { .. } => None,
        }
    }
}

/// Calls `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget runs out.
pub async fn call_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    stage: Stage,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SignalError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::transient(
                stage,
                format!("timed out after {:?}", policy.timeout),
            )),
        };

        let err = match result {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= max_attempts {
            return RetryOutcome::Failed {
                attempts: attempt,
                last_error: err,
            };
        }

        let backoff = policy.backoff(attempt);
        tracing::warn!(%stage, attempt, max_attempts, ?backoff, error = %err, "call failed; retrying");
        tokio::time::sleep(backoff).await;
    }
}
