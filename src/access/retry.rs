//! Retry executor with exponential backoff
//!
//! - Attempt numbering starts at 0; `max_retries` bounds the retries, so an
//!   operation runs at most `max_retries + 1` times
//! - Backoff: `min(base^attempt, max)` seconds, scaled by a uniform factor in
//!   `[0.5, 1.0]` when jitter is on
//! - Non-retryable errors return immediately without touching the budget
//! - On exhaustion the last error is returned unchanged

use crate::errors::{Result, ToolError};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default exponential base (seconds)
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Default backoff cap
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Retry executor with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    /// Retries allowed after the first attempt
    max_retries: u32,

    /// Exponential base in seconds
    backoff_base: f64,

    /// Maximum delay cap
    backoff_max: Duration,

    /// Enable jitter
    enable_jitter: bool,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutor {
    /// Create retry executor with default settings
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX)
    }

    /// Create retry executor with custom settings
    pub fn with_config(max_retries: u32, backoff_base: f64, backoff_max: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
            backoff_max,
            enable_jitter: true,
        }
    }

    /// Disable jitter (deterministic delays)
    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Run `operation`, retrying errors the taxonomy marks as retryable
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_policy(operation, ToolError::is_retryable)
            .await
    }

    /// Run `operation`, retrying errors for which `is_retryable` returns true
    pub async fn execute_with_policy<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !is_retryable(&e) {
                        if attempt > 0 {
                            tracing::warn!(error = %e, attempt, "non-retryable error after retries");
                        }
                        return Err(e);
                    }

                    if attempt >= self.max_retries {
                        tracing::error!(
                            error = %e,
                            attempts = attempt + 1,
                            "operation failed, retries exhausted"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "operation failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Pre-jitter delay after the given attempt
    pub fn ideal_backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self
            .backoff_base
            .powi(exponent)
            .min(self.backoff_max.as_secs_f64());
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(self.backoff_max)
    }

    /// Delay actually slept after the given attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ideal = self.ideal_backoff(attempt);
        if self.enable_jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            Duration::try_from_secs_f64(ideal.as_secs_f64() * factor).unwrap_or(ideal)
        } else {
            ideal
        }
    }

    /// Upper bound on total sleep across all retries
    pub fn max_total_wait(&self) -> Duration {
        (0..self.max_retries)
            .map(|a| self.ideal_backoff(a))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_base(&self) -> f64 {
        self.backoff_base
    }

    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}
