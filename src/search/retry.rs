//! Retry logic with exponential backoff for vector-backend and
//! embedding-provider operations (SPEC_FULL "Circuit breaker +
//! exponential-backoff retry"), generalized from `SearchError`'s
//! Redis/Postgres-specific variants onto the `CoreError` taxonomy of
//! spec.md §7: `Connection` retries with exponential back-off up to
//! `retryAttempts`; `Authentication` retries exactly once after re-auth,
//! then surfaces; everything else is not retried here (Validation/
//! Timeout/RateLimit/CapacityExceeded/Processing are surfaced or
//! converted to the sentinel result by the processor, never retried).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100), // 100ms, 200ms, 400ms
            max_delay: Duration::from_millis(1000),
            jitter_factor: 0.1,
        }
    }
}

pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn with_exponential_backoff() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<F, Fut, T>(&self, operation: F) -> CoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let config = &self.config;
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("operation succeeded after {attempt} retries");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let retry_cap = self.retry_cap(&error, config.max_retries);
                    last_error = Some(error.clone());

                    if !self.should_retry(&error) {
                        debug!("not retrying error: {error}");
                        return Err(error);
                    }

                    if attempt < retry_cap {
                        let delay = self.calculate_exponential_delay(attempt, config);
                        warn!("operation failed (attempt {}/{}), retrying in {delay:?}: {error}", attempt + 1, retry_cap + 1);
                        sleep(delay).await;
                    } else {
                        warn!("operation failed after {} attempts: {error}", attempt + 1);
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::Processing("retry logic error: no attempts made".to_string())))
    }

    fn calculate_exponential_delay(&self, attempt: u32, config: &RetryConfig) -> Duration {
        let exponential_delay = config.base_delay.as_millis() as u64 * (1u64 << attempt);
        let exponential_delay = Duration::from_millis(exponential_delay);
        let capped_delay = std::cmp::min(exponential_delay, config.max_delay);

        if config.jitter_factor > 0.0 {
            let jitter_range = (capped_delay.as_millis() as f64 * config.jitter_factor) as u64;
            let jitter = rand::thread_rng().gen_range(0..=jitter_range);
            Duration::from_millis(capped_delay.as_millis() as u64 + jitter)
        } else {
            capped_delay
        }
    }

    /// `Connection` retries up to the configured cap; `Authentication`
    /// retries exactly once regardless of configuration (§7 "retried
    /// once after re-auth, then surfaced").
    fn retry_cap(&self, error: &CoreError, configured_max: u32) -> u32 {
        match error {
            CoreError::Authentication(_) => configured_max.min(1),
            _ => configured_max,
        }
    }

    fn should_retry(&self, error: &CoreError) -> bool {
        matches!(error, CoreError::Connection(_) | CoreError::Authentication(_))
    }
}
