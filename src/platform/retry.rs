//! Retry logic for page and script fetches

use crate::error::ResolveError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed future returned by a retried operation
pub type RetryFuture<T> = Pin<Box<dyn Future<Output = Result<T, ResolveError>> + Send>>;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set jitter factor
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before the retry following one that waited `delay`
    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis((delay.as_millis() as f64 * self.backoff_multiplier) as u64);
        next.min(self.max_delay)
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return Duration::ZERO;
        }
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * range;
        Duration::from_millis(jitter.abs() as u64)
    }
}

/// Retry executor
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new retry executor with configuration
    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `func`, retrying errors that [`ResolveError::is_retryable`] accepts
    pub async fn execute<F, T>(&self, func: F) -> Result<T, ResolveError>
    where
        F: FnMut() -> RetryFuture<T>,
    {
        self.execute_with_error_handler(func, ResolveError::is_retryable)
            .await
    }

    /// Run `func`, retrying errors for which `is_retryable` returns true
    pub async fn execute_with_error_handler<F, T, E>(
        &self,
        mut func: F,
        is_retryable: E,
    ) -> Result<T, ResolveError>
    where
        F: FnMut() -> RetryFuture<T>,
        E: Fn(&ResolveError) -> bool,
    {
        let mut delay = self.config.initial_delay;
        let mut attempt = 0;

        loop {
            let error = match func().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if !is_retryable(&error) || attempt >= self.config.max_retries {
                if attempt > 0 {
                    warn!("Giving up after {} attempts: {}", attempt + 1, error);
                }
                return Err(error);
            }

            attempt += 1;
            let total_delay = delay + self.config.jitter(delay);
            debug!(
                "Retry {}/{} in {:?} after: {}",
                attempt, self.config.max_retries, total_delay, error
            );
            tokio::time::sleep(total_delay).await;
            delay = self.config.next_delay(delay);
        }
    }
}
