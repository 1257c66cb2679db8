//! Bounded retry with exponential backoff
//!
//! A `RetryPolicy` wraps any fallible async operation:
//! - Attempt 1 runs immediately
//! - Attempt n (n >= 2) waits `min(wait_max, wait_min * multiplier^(n-2))`
//! - Only errors the caller marks retryable are retried
//! - After `max_attempts` failures the last error is returned as-is
//!
//! Delays are deterministic; there is no jitter.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub wait_min: Duration,
    pub wait_max: Duration,
    pub multiplier: f64,
    cancel: Option<CancellationToken>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` below 1 is raised to 1
    pub fn new(max_attempts: u32, wait_min: Duration, wait_max: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait_min,
            wait_max: wait_max.max(wait_min),
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
            cancel: None,
        }
    }

    /// Retries without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.wait_min_ms),
            Duration::from_millis(config.wait_max_ms),
            config.multiplier,
        )
    }

    /// Stops waiting (and retrying) once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Delay before the given 1-indexed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let nanos = self.wait_min.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.wait_max.as_nanos() as f64 {
            return self.wait_max;
        }
        Duration::from_nanos(nanos.round() as u64).min(self.wait_max)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// exhausts `max_attempts`
    ///
    /// If the policy's cancellation token fires during a backoff wait, the
    /// error from the attempt that just failed is returned immediately.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !is_retryable(&error) {
                tracing::debug!("Attempt {} failed with non-retryable error: {}", attempt, error);
                return Err(error);
            }

            if attempt >= self.max_attempts {
                tracing::warn!("Giving up after {} attempts: {}", attempt, error);
                return Err(error);
            }

            attempt += 1;
            let delay = self.delay_for_attempt(attempt);
            tracing::debug!(
                "Attempt {} failed: {}; retrying in {:?}",
                attempt - 1,
                error,
                delay
            );

            if !self.wait(delay).await {
                tracing::debug!("Retry wait cancelled");
                return Err(error);
            }
        }
    }

    /// Sleeps for `delay`; false if cancelled first
    async fn wait(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
