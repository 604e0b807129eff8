//! Bounded exponential-backoff retry around the projection apply step.

use std::future::Future;
use std::time::Duration;

use crate::error::ViewStoreError;

/// Errors that can tell whether another attempt might succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for ViewStoreError {
    fn is_transient(&self) -> bool {
        ViewStoreError::is_transient(self)
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts made, including the first.
    pub attempts: u32,
    /// The last error seen.
    pub error: E,
}

/// Retry policy: `max_attempts` total tries, sleeping
/// `min(base_delay * 2^(attempt-1), max_delay)` after failed attempt `attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// `on_retry` is called before each backoff sleep with the failed attempt
    /// number, its error, and the delay about to be waited.
    pub async fn run<T, E, F, Fut, R>(&self, mut op: F, mut on_retry: R) -> Result<T, RetryFailure<E>>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(u32, &E, Duration),
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() || attempt >= self.max_attempts => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    on_retry(attempt, &error, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
