//! Bounded retry executor
//!
//! Runs a caller-supplied async operation until it succeeds, fails with a
//! terminal error, runs out of attempts, or is cancelled. Attempts are
//! strictly sequential; the executor sleeps only between a retryable failure
//! and the next attempt.

use crate::backoff::jittered_backoff;
use crate::classify::is_retryable;
use crate::config::RetryConfig;
use crate::error::{CallError, ConfigError};
use crate::metrics::RetryMetrics;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suspends the retry loop between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Retries an operation according to a [`RetryConfig`].
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    metrics: RetryMetrics,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl RetryExecutor {
    /// Create an executor after validating `config`
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            sleeper: Arc::new(TokioSleeper),
            metrics: RetryMetrics::new(),
        })
    }

    /// Replace the sleeper, e.g. with one that records delays in tests
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Share a metrics collector with other components
    pub fn with_metrics(mut self, metrics: RetryMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RetryMetrics {
        &self.metrics
    }

    /// Run `operation` with retries and no external cancellation.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        self.execute_cancellable(operation, &CancellationToken::new())
            .await
    }

    /// Run `operation` with retries until success, a terminal error,
    /// attempt exhaustion, or `cancel` firing.
    ///
    /// On failure the last encountered error is returned. Cancellation
    /// interrupts both an in-flight attempt and a backoff sleep and yields
    /// [`CallError::Cancelled`].
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        self.metrics.record_operation();

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(attempt, max_attempts));
            }

            self.metrics.record_attempt(attempt);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(CallError::Cancelled),
                result = self.run_attempt(&mut operation) => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 0 {
                        self.metrics.record_recovered();
                        info!(
                            attempts = attempt + 1,
                            max_attempts, "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(CallError::Cancelled) => {
                    return Err(self.cancelled(attempt + 1, max_attempts));
                }
                Err(error) => error,
            };

            let retryable = is_retryable(&error, &self.config.retryable_statuses);
            let exhausted = attempt + 1 >= max_attempts;
            warn!(
                attempt = attempt + 1,
                max_attempts,
                status = ?error.status(),
                network = error.is_network_error(),
                retryable,
                error = %error,
                "Attempt failed"
            );

            if !retryable || exhausted {
                self.metrics.record_failure();
                return Err(error);
            }

            let delay = jittered_backoff(
                attempt,
                self.config.base_delay_ms,
                self.config.max_delay_ms,
            );
            debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Backing off before next attempt"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(attempt + 1, max_attempts)),
                _ = self.sleeper.sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn run_attempt<T, F, Fut>(&self, operation: &mut F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        match self.config.attempt_timeout() {
            Some(limit) => tokio::time::timeout(limit, operation())
                .await
                .unwrap_or(Err(CallError::Timeout { after: limit })),
            None => operation().await,
        }
    }

    fn cancelled(&self, attempts_made: u32, max_attempts: u32) -> CallError {
        self.metrics.record_failure();
        info!(
            attempts = attempts_made,
            max_attempts, "Operation cancelled"
        );
        CallError::Cancelled
    }
}
