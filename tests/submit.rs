mod common;

use async_trait::async_trait;
use common::{ScriptedServer, closed_port_url};
use resilient_call::config::{AppConfig, HttpConfig, RetryConfig};
use resilient_call::error::{CallError, StoreError, SubmitError};
use resilient_call::http::HttpCallAdapter;
use resilient_call::queue::{FailureQueue, KeyValueStore, MemoryStore};
use resilient_call::retry::{RetryExecutor, Sleeper};
use resilient_call::submit::ResilientSubmitter;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _delay: Duration) {}
}

/// Store whose `set` waits until another task releases it
struct GatedStore {
    inner: MemoryStore,
    entered: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl KeyValueStore for GatedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entered.store(true, Ordering::SeqCst);
        let released = self
            .gate
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(2))
            .is_ok();
        self.released.store(released, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

fn submitter() -> ResilientSubmitter {
    let executor = RetryExecutor::new(RetryConfig {
        max_attempts: 3,
        base_delay_ms: 100,
        max_delay_ms: 1000,
        attempt_timeout_ms: Some(5_000),
        ..RetryConfig::default()
    })
    .unwrap()
    .with_sleeper(NoSleep);
    ResilientSubmitter::new(
        HttpCallAdapter::new(&HttpConfig::default()),
        executor,
        FailureQueue::new(MemoryStore::new(), "failed_submissions", 50),
    )
}

#[tokio::test]
async fn test_transient_failures_recover() {
    let server = ScriptedServer::start(&[503, 502, 200]).await;
    let submitter = submitter();

    let response = submitter
        .submit(
            "contact-form",
            &server.url("/contacts"),
            &json!({"email": "a@b.com"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(server.hits(), 3);
    assert!(submitter.queue().is_empty());

    let snapshot = submitter.metrics().snapshot();
    assert_eq!(snapshot.recovered, 1);
    assert_eq!(snapshot.queued, 0);
}

#[tokio::test]
async fn test_exhausted_retries_are_queued() {
    let server = ScriptedServer::start(&[503]).await;
    let submitter = submitter();
    let payload = json!({"email": "a@b.com", "source": "pricing"});

    let err = submitter
        .submit(
            "demo-request",
            &server.url("/contacts"),
            &payload,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Failed(CallError::Http { status: 503, .. })
    ));
    assert_eq!(server.hits(), 3);

    let entries = submitter.queue().list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].form_type, "demo-request");
    assert_eq!(entries[0].form_data, payload);
    assert_eq!(entries[0].error.status, Some(503));

    let snapshot = submitter.metrics().snapshot();
    assert_eq!(snapshot.failures, 1);
    assert_eq!(snapshot.queued, 1);
}

#[tokio::test]
async fn test_terminal_status_is_queued_after_one_call() {
    let server = ScriptedServer::start(&[400]).await;
    let submitter = submitter();

    let err = submitter
        .submit(
            "contact-form",
            &server.url("/contacts"),
            &json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Failed(CallError::Http { status: 400, .. })
    ));
    assert_eq!(server.hits(), 1);
    assert_eq!(submitter.queue().len(), 1);
}

#[tokio::test]
async fn test_duplicate_is_returned_without_retry_or_queueing() {
    let server = ScriptedServer::start(&[422]).await;
    let submitter = submitter();

    let response = submitter
        .submit(
            "contact-form",
            &server.url("/contacts"),
            &json!({"email": "dup@b.com"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 422);
    assert_eq!(server.hits(), 1);
    assert!(submitter.queue().is_empty());

    let snapshot = submitter.metrics().snapshot();
    assert_eq!(snapshot.passed_through, 1);
    assert_eq!(snapshot.attempts, 1);
    assert_eq!(snapshot.retries, 0);
}

#[tokio::test]
async fn test_network_failure_is_queued_without_status() {
    let submitter = submitter();

    let err = submitter
        .submit(
            "newsletter",
            &closed_port_url().await,
            &json!({"email": "a@b.com"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Failed(CallError::Network { .. })));
    assert_eq!(submitter.metrics().snapshot().attempts, 3);

    let entries = submitter.queue().list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].error.status, None);
}

#[tokio::test]
async fn test_invalid_url_is_not_sent_or_queued() {
    let submitter = submitter();

    let err = submitter
        .submit("contact-form", "::nope::", &json!({}), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::InvalidRequest(_)));
    assert!(submitter.queue().is_empty());
    assert_eq!(submitter.metrics().snapshot().operations, 0);
}

#[tokio::test]
async fn test_cancelled_submission_is_queued() {
    let server = ScriptedServer::start(&[200]).await;
    let submitter = submitter();
    let token = CancellationToken::new();
    token.cancel();

    let err = submitter
        .submit("contact-form", &server.url("/contacts"), &json!({"a": 1}), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Failed(CallError::Cancelled)));
    assert_eq!(server.hits(), 0);
    let entries = submitter.queue().list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].error.message, "cancelled");
}

#[tokio::test]
async fn test_from_config_uses_file_queue() {
    let dir = TempDir::new().unwrap();
    let server = ScriptedServer::start(&[400]).await;
    let mut config = AppConfig::default();
    config.queue.store_dir = dir.path().to_path_buf();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 1;

    let submitter = ResilientSubmitter::from_config(&config).unwrap();
    let _ = submitter
        .submit(
            "contact-form",
            &server.url("/contacts"),
            &json!({"x": 1}),
            &CancellationToken::new(),
        )
        .await;

    let reloaded = FailureQueue::from_config(&config.queue);
    assert_eq!(reloaded.len(), 1);
    assert!(dir.path().join("failed_submissions.json").exists());
}

#[test]
fn test_from_config_rejects_invalid_config() {
    let mut config = AppConfig::default();
    config.retry.max_attempts = 0;
    assert!(ResilientSubmitter::from_config(&config).is_err());
}

#[tokio::test]
async fn test_queue_write_does_not_block_the_runtime() {
    let (tx, rx) = mpsc::channel();
    let entered = Arc::new(AtomicBool::new(false));
    let released = Arc::new(AtomicBool::new(false));
    let store = GatedStore {
        inner: MemoryStore::new(),
        entered: Arc::clone(&entered),
        released: Arc::clone(&released),
        gate: Mutex::new(rx),
    };

    let waiter = Arc::clone(&entered);
    tokio::spawn(async move {
        while !waiter.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let _ = tx.send(());
    });

    let executor = RetryExecutor::new(RetryConfig {
        max_attempts: 1,
        ..RetryConfig::default()
    })
    .unwrap()
    .with_sleeper(NoSleep);
    let submitter = ResilientSubmitter::new(
        HttpCallAdapter::new(&HttpConfig::default()),
        executor,
        FailureQueue::new(store, "failed_submissions", 50),
    );

    let err = submitter
        .submit(
            "contact-form",
            &closed_port_url().await,
            &json!({"a": 1}),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Failed(CallError::Network { .. })));
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(submitter.queue().len(), 1);
    assert_eq!(submitter.metrics().snapshot().queued, 1);
}
