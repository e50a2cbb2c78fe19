//! Exponential backoff around network calls.
//!
//! ```text
//! attempt 1: immediate
//! attempt 2: initial_backoff                 (±25 % jitter)
//! attempt 3: initial_backoff * multiplier    (±25 % jitter)
//! ...
//! attempt n: capped at max_backoff
//! ```
//!
//! Only failures the classifier calls transient are retried. Anything else
//! (SQL errors, authentication failures, protocol violations) is returned as
//! soon as it is seen.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::Error;

/// Retry policy for a single logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,

    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(16),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// The delay before retry number `retry` (zero based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let delay_ms = self.initial_backoff.as_millis() as f64 * factor;

        if !delay_ms.is_finite() || delay_ms >= self.max_backoff.as_millis() as f64 {
            self.max_backoff
        } else {
            Duration::from_millis(delay_ms as u64)
        }
    }

    fn jittered(&self, retry: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);

        self.backoff(retry).mul_f64(jitter).min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails with an error `is_transient`
    /// rejects, or the attempts run out.
    ///
    /// The operation receives the 1-based attempt number. When every attempt
    /// failed transiently the last error is wrapped in
    /// [`Error::RetriesExhausted`].
    pub async fn run<T, F, Fut, C>(&self, mut operation: F, is_transient: C) -> Result<T, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
        C: Fn(&Error) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !is_transient(&error) {
                return Err(error);
            }

            if attempt >= max_attempts {
                log::warn!(
                    "giving up after {} attempt(s); last error: {}",
                    attempt,
                    error
                );

                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = self.jittered(attempt - 1);

            log::debug!(
                "attempt {}/{} failed ({}); retrying in {:?}",
                attempt,
                max_attempts,
                error,
                delay
            );

            sqlx_rt::sleep(delay).await;
            attempt += 1;
        }
    }
}
