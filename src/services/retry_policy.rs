//! Retry policies for the appearance capability requests.
//!
//! A policy is consulted after each failed attempt and answers whether (and
//! after how long) the caller should try again. Policies are stateful: use one
//! instance per logical operation.

use std::time::Duration;

use tracing::debug;

use crate::domain::models::RetryConfig;

/// Decides whether a failed request should be retried.
pub trait RetryPolicy: Send {
    /// Called after a failure with the HTTP status (`0` when none was received).
    ///
    /// # Returns
    /// * `Some(wait)` - retry after `wait`
    /// * `None` - give up
    fn should_retry(&mut self, status: u16) -> Option<Duration>;

    /// Number of retries granted so far.
    fn retry_count(&self) -> u32;
}

/// Clamped multiplicative backoff with a retry ceiling.
///
/// Returns the current delay and then grows it: `delay = clamp(delay * factor,
/// min, max)`. The first wait is `min_delay`.
#[derive(Debug, Clone)]
pub struct AdaptiveRetryPolicy {
    min_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    max_retries: u32,
    delay: Duration,
    retry_count: u32,
}

impl AdaptiveRetryPolicy {
    pub fn new(min_delay: Duration, max_delay: Duration, backoff_factor: f64, max_retries: u32) -> Self {
        Self {
            min_delay,
            max_delay,
            backoff_factor,
            max_retries,
            delay: min_delay,
            retry_count: 0,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_secs_f64(config.min_delay_secs),
            Duration::from_secs_f64(config.max_delay_secs),
            config.backoff_factor,
            config.max_retries,
        )
    }

    /// Policy for appearance update requests: 1s to 32s, doubling, 10 retries.
    pub fn for_appearance_requests() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(32), 2.0, 10)
    }

    /// Policy for COF version increments: 1s to 16s, doubling, 5 retries.
    pub fn for_increment_requests() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(16), 2.0, 5)
    }
}

impl RetryPolicy for AdaptiveRetryPolicy {
    fn should_retry(&mut self, status: u16) -> Option<Duration> {
        if self.retry_count >= self.max_retries {
            debug!(status, retries = self.retry_count, "retry budget exhausted");
            return None;
        }

        let wait = self.delay;
        self.delay = self
            .delay
            .mul_f64(self.backoff_factor)
            .clamp(self.min_delay, self.max_delay);
        self.retry_count += 1;

        debug!(
            status,
            attempt = self.retry_count,
            wait_ms = wait.as_millis() as u64,
            "retry scheduled"
        );
        Some(wait)
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

/// Retries forever with no delay. Useful where the caller bounds attempts
/// by other means.
#[derive(Debug, Clone, Default)]
pub struct AlwaysRetryImmediately {
    retry_count: u32,
}

impl RetryPolicy for AlwaysRetryImmediately {
    fn should_retry(&mut self, _status: u16) -> Option<Duration> {
        self.retry_count = self.retry_count.saturating_add(1);
        Some(Duration::ZERO)
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }
}
