/// Counters for retry and persistence activity
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector shared by executors and submitters
#[derive(Clone, Debug, Default)]
pub struct RetryMetrics {
    /// Logical operations started
    pub operations: Arc<AtomicU64>,
    /// Individual attempts, first tries included
    pub attempts: Arc<AtomicU64>,
    /// Attempts made after a failure
    pub retries: Arc<AtomicU64>,
    /// Operations that succeeded after at least one retry
    pub recovered: Arc<AtomicU64>,
    /// Operations that ended in a propagated error
    pub failures: Arc<AtomicU64>,
    /// Non-2xx responses handed back under the accept policy
    pub passed_through: Arc<AtomicU64>,
    /// Submissions written to the failure queue
    pub queued: Arc<AtomicU64>,
}

impl RetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one attempt; `attempt` is 0-indexed
    pub fn record_attempt(&self, attempt: u32) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt > 0 {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_recovered(&self) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self.operations.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);

        MetricsSnapshot {
            operations,
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            failures,
            passed_through: self.passed_through.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            success_rate: if operations > 0 {
                (operations.saturating_sub(failures) as f64 / operations as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of [`RetryMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub operations: u64,
    pub attempts: u64,
    pub retries: u64,
    pub recovered: u64,
    pub failures: u64,
    pub passed_through: u64,
    pub queued: u64,
    pub success_rate: f64,
}
