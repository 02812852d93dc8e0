//! Time bounded polling with exponential backoff
//!
//! Each reconcile operation drives its remote calls through
//! [`RetryPolicy::execute`]: the operation reports whether it is done,
//! still pending, or failed for good, and the policy sleeps between
//! attempts until the overall window closes.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of a single attempt
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Terminal success
    Done(T),
    /// Not converged yet; carries the transient error if there was one
    Pending(Option<E>),
    /// Terminal failure, no further attempts
    Failed(E),
}

/// Why [`RetryPolicy::execute`] gave up
#[derive(Debug, PartialEq)]
pub enum RetryError<E> {
    Failed(E),
    TimedOut {
        elapsed: Duration,
        /// Most recent transient error seen before the window closed
        last_error: Option<E>,
    },
}

/// Polling window and pacing for one kind of operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Overall window, measured from the start of `execute`
    pub timeout: Duration,
    /// Wait before the first attempt
    pub delay: Duration,
    /// Floor for the wait between attempts
    pub min_interval: Duration,
    /// Ceiling for the wait between attempts
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create convergence: 45 minute window, first poll after 30s, then every 10s
    pub fn create_default() -> Self {
        Self {
            timeout: Duration::from_secs(45 * 60),
            delay: Duration::from_secs(30),
            min_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(10),
            backoff_multiplier: 1.0,
        }
    }

    pub fn read_default() -> Self {
        Self {
            timeout: Duration::from_secs(2 * 60),
            delay: Duration::ZERO,
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    pub fn delete_default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            ..Self::read_default()
        }
    }

    /// Run `operation` until it completes, fails, or the window closes
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let mut last_error = None;
        let mut attempt = 0u32;

        if !self.delay.is_zero() {
            debug!(delay_ms = self.delay.as_millis(), "Waiting before first attempt");
            tokio::time::sleep(self.delay.min(self.timeout)).await;
        }

        loop {
            match operation().await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Failed(err) => return Err(RetryError::Failed(err)),
                Attempt::Pending(err) => {
                    if let Some(err) = err {
                        last_error = Some(err);
                    }
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    attempts = attempt + 1,
                    elapsed_ms = elapsed.as_millis(),
                    "Retry window exhausted"
                );
                return Err(RetryError::TimedOut {
                    elapsed,
                    last_error,
                });
            }

            let backoff = self.calculate_backoff(attempt).min(self.timeout - elapsed);
            match &last_error {
                Some(err) => debug!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis(),
                    error = %err,
                    "Retrying after transient error"
                ),
                None => debug!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis(),
                    "Still pending, polling again"
                ),
            }

            tokio::time::sleep(backoff).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Wait before the attempt following `attempt`
    ///
    /// `min_interval * multiplier^attempt`, clamped to
    /// `[min_interval, max_interval]`.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.min_interval.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = base
            .min(self.max_interval.as_secs_f64())
            .max(self.min_interval.as_secs_f64());

        Duration::from_secs_f64(capped)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::read_default()
    }
}
