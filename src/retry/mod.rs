//! Bounded retry with exponential backoff and jitter.
//!
//! The attempt counter is explicit loop state, never call depth: a policy
//! with `retries = N` runs the operation at most `N + 1` times and the last
//! error always propagates to the caller.
//!
//! Retries through the request queue should go via
//! [`crate::queue::RequestQueue::enqueue_with_retry`], which re-enqueues each
//! attempt so the queue's concurrency bound and backoff windows still apply.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `retries + 1`
    pub retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for the computed delay, before jitter
    pub max_delay: Duration,
    /// Exponential growth factor
    pub factor: f64,
    /// Jitter fraction: each delay gains a random `[0, jitter)` share of itself
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Default backoff shape with a custom retry count
    pub fn new(retries: u32) -> Self {
        Self { retries, ..Default::default() }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self { retries: 0, ..Default::default() }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// The deterministic part of the delay before retry number
    /// `attempt` (0-based): `min(base * factor^attempt, max)`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let millis = self.base_delay.as_millis() as f64 * self.factor.powi(attempt as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    /// The full delay including jitter, used between attempts
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let fraction = rand::thread_rng().gen_range(0.0..self.jitter);
        base + base.mul_f64(fraction)
    }

    /// Run an operation, retrying every failure up to the bound
    pub async fn run<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(op, |_| true).await
    }

    /// Run an operation, retrying only failures the predicate accepts
    pub async fn run_if<F, Fut, T, E, P>(&self, op: F, mut should_retry: P) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt >= self.retries {
                        warn!(attempts = attempt + 1, error = %e, "retries exhausted");
                        return Err(e);
                    }
                    if !should_retry(&e) {
                        debug!(error = %e, "error is not retryable");
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
