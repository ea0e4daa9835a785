//! Rate-limit aware retry logic shared by all three channels.
//!
//! GitHub signals primary and secondary rate limits with 403/429 responses.
//! When a reset hint is available the policy sleeps until the limit resets;
//! otherwise it falls back to capped exponential backoff. The curve and the
//! retry cap are operational tuning parameters, so they are configurable
//! rather than hard-coded.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Error;

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Maximum delay cap in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the given max retries and base delay.
    /// The maximum delay cap defaults to 60 seconds.
    pub fn new(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
            max_delay_secs: default_max_delay_secs(),
        }
    }

    /// Whether the error should be retried at the given attempt number.
    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        error.is_retryable()
    }

    /// Calculate the delay before the given retry attempt.
    ///
    /// A [`Error::RateLimited`] carrying a reset hint uses that hint directly
    /// (capped at `max_delay_secs`). Everything else uses
    /// `min(base_delay_secs * 2^attempt, max_delay_secs)`.
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        let secs = if let Error::RateLimited {
            reset_in_secs: Some(reset),
        } = error
        {
            (*reset).min(self.max_delay_secs)
        } else {
            let exponential = self
                .base_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt));
            exponential.min(self.max_delay_secs)
        };
        Duration::from_secs(secs)
    }

    /// Execute an async operation with retry.
    ///
    /// The closure `f` is called repeatedly until it succeeds, a
    /// non-retryable error occurs, or the retry budget is exhausted. After
    /// exhaustion the last error is wrapped in [`Error::RetriesExhausted`] so
    /// the caller can surface the failure per item instead of aborting the
    /// whole run.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_retryable() {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %error,
                                "Retry budget exhausted"
                            );
                            return Err(Error::RetriesExhausted {
                                attempts: attempt + 1,
                                message: format!(
                                    "{operation_name} failed after {} attempt(s): {error}",
                                    attempt + 1
                                ),
                            });
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
