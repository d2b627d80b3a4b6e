//! Retry controller for contended commits.
//!
//! [`retry`] runs an operation until it succeeds, fails with an error the
//! classifier deems permanent, runs out of attempts, or runs past the caller's
//! deadline:
//!
//! ```text
//! Attempting ──ok──────────────────────────────▶ Success
//!     │ retryable, attempts left ──backoff──▶ Attempting
//!     │ retryable, no attempts left ────────▶ Exhausted
//!     │ not retryable ──────────────────────▶ Failed
//!     └ deadline passed ────────────────────▶ DeadlineExceeded
//! ```

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tally_shared::PostingConfig;
use tokio::time::Instant;

/// Backoff policy: `min(base × 2^attempt, max_delay)` plus random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt (attempt index 0 failed).
    pub base_delay: Duration,
    /// Cap on the exponential part of a delay.
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PostingConfig::default())
    }
}

impl RetryPolicy {
    /// Builds the policy from posting configuration.
    #[must_use]
    pub fn from_config(config: &PostingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff plus jitter drawn from `[0, jitter]`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.backoff(attempt) + jitter
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Why [`retry`] gave up.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation failed with an error that is not worth retrying.
    Fatal {
        /// Attempts made.
        attempts: u32,
        /// The error.
        error: E,
    },
    /// Every attempt failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The final attempt's error.
        last: E,
    },
    /// The deadline passed during an attempt or would pass during backoff.
    DeadlineExceeded {
        /// Attempts started.
        attempts: u32,
    },
}

/// Runs `op` under `policy`.
///
/// `op` receives the 0-based attempt index. When `deadline` is set, each
/// attempt is raced against it and dropped if the deadline passes first.
pub async fn retry<T, E, Op, Fut, C>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    is_retryable: C,
    mut op: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        let attempts = attempt + 1;
        let outcome = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, op(attempt)).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(RetryError::DeadlineExceeded { attempts }),
            },
            None => op(attempt).await,
        };

        let error = match outcome {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempts, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            return Err(RetryError::Fatal { attempts, error });
        }

        if attempts >= max_attempts {
            tracing::warn!(attempts, error = %error, "retries exhausted");
            return Err(RetryError::Exhausted {
                attempts,
                last: error,
            });
        }

        let delay = policy.delay_for(attempt);
        if let Some(deadline) = deadline {
            if Instant::now() + delay >= deadline {
                return Err(RetryError::DeadlineExceeded { attempts });
            }
        }

        tracing::debug!(
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "retryable failure, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
