//! Bounded retry with linearly growing, capped delays
//!
//! Providers never retry on their own; every retry in the system goes
//! through [`RetryPolicy::run`] so the schedule is visible in one place and
//! sleeps go through the injected [`Clock`].

use crate::error::Error;
use crate::traits::Clock;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retry schedule: `max_retries` extra attempts, retry `n` waits
/// `min(n * base_delay, max_delay)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

/// The operation failed for good
#[derive(Debug)]
pub struct Exhausted {
    /// Attempts actually made
    pub attempts: u32,
    /// Error returned by the last attempt
    pub error: Error,
    /// Attempts were left but the deadline allowed no further retry
    pub deadline_reached: bool,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up
    ///
    /// When a `deadline` is given no retry is scheduled whose delay would end
    /// past it.
    pub async fn run<T, F, Fut>(
        &self,
        clock: &dyn Clock,
        deadline: Option<Instant>,
        label: &str,
        mut op: F,
    ) -> Result<T, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_transient() {
                debug!(label, attempt, error = %error, "non-transient error, not retrying");
                return Err(Exhausted {
                    attempts: attempt,
                    error,
                    deadline_reached: false,
                });
            }

            if attempt >= self.max_attempts() {
                warn!(label, attempt, error = %error, "retries exhausted");
                return Err(Exhausted {
                    attempts: attempt,
                    error,
                    deadline_reached: false,
                });
            }

            let delay = self.delay_for(attempt);
            if let Some(deadline) = deadline
                && clock.now() + delay >= deadline
            {
                warn!(label, attempt, error = %error, "deadline leaves no room for another retry");
                return Err(Exhausted {
                    attempts: attempt,
                    error,
                    deadline_reached: true,
                });
            }

            warn!(label, attempt, delay_ms = delay.as_millis() as u64, error = %error, "attempt failed, retrying");
            clock.sleep(delay).await;
        }
    }
}
