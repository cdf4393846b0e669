//! Form submission with retries and a durable fallback

use crate::config::AppConfig;
use crate::error::{CallError, SubmitError};
use crate::http::{CallRequest, CallResponse, HttpCallAdapter};
use crate::metrics::RetryMetrics;
use crate::queue::FailureQueue;
use crate::retry::RetryExecutor;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Posts JSON payloads through the retry executor and queues the ones
/// that cannot be delivered.
#[derive(Debug, Clone)]
pub struct ResilientSubmitter {
    adapter: HttpCallAdapter,
    executor: RetryExecutor,
    queue: FailureQueue,
}

impl ResilientSubmitter {
    pub fn new(adapter: HttpCallAdapter, executor: RetryExecutor, queue: FailureQueue) -> Self {
        Self {
            adapter,
            executor,
            queue,
        }
    }

    /// Build the adapter, executor and file-backed queue from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let adapter = HttpCallAdapter::new(&config.http);
        let executor =
            RetryExecutor::new(config.retry.clone()).context("Invalid retry configuration")?;
        Ok(Self::new(
            adapter,
            executor,
            FailureQueue::from_config(&config.queue),
        ))
    }

    pub fn queue(&self) -> &FailureQueue {
        &self.queue
    }

    pub fn metrics(&self) -> &RetryMetrics {
        self.executor.metrics()
    }

    /// POST `payload` to `url`.
    ///
    /// Accepted responses (2xx, plus pass-through statuses such as 409/422)
    /// are returned as-is. When the call fails for good, including by
    /// cancellation, the payload is pushed to the failure queue under
    /// `form_type` and the last error is returned.
    pub async fn submit(
        &self,
        form_type: &str,
        url: &str,
        payload: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<CallResponse, SubmitError> {
        let request = CallRequest::post_json(url, payload)?;

        let result = self
            .executor
            .execute_cancellable(|| self.adapter.call(&request), cancel)
            .await;

        match result {
            Ok(response) => {
                if !response.is_success() {
                    self.metrics().record_pass_through();
                    info!(
                        form_type,
                        status = response.status,
                        "Submission answered with pass-through status"
                    );
                }
                Ok(response)
            }
            Err(e) => {
                error!(form_type, url, error = %e, "Submission failed, queueing for recovery");
                self.enqueue(form_type, payload, &e).await;
                Err(SubmitError::Failed(e))
            }
        }
    }

    /// Queue writes hit the store synchronously, so they run on the blocking pool
    async fn enqueue(&self, form_type: &str, payload: &serde_json::Value, error: &CallError) {
        let queue = self.queue.clone();
        let form_type = form_type.to_string();
        let payload = payload.clone();
        let error = error.clone();
        let pushed =
            tokio::task::spawn_blocking(move || queue.push(&form_type, payload, &error)).await;

        match pushed {
            Ok(()) => self.metrics().record_queued(),
            Err(e) => error!(error = %e, "Failure queue write did not complete"),
        }
    }
}
