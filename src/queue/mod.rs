//! Durable queue of submissions that could not be delivered
//!
//! Entries are kept as a JSON array under a single storage key. The queue
//! is bounded: once it holds `max_entries` items, each push evicts the
//! oldest entry. Reads and writes are best-effort; storage problems are
//! logged and never surface to the caller of `push`, `list` or `clear`.
//! A push whose read of the current state fails is dropped rather than
//! written over entries it could not see.
//!
//! The read-modify-write in `push` is not atomic across processes sharing
//! one store. A single writer is assumed.

pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use crate::config::QueueConfig;
use crate::error::{CallError, StoreError};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default number of retained entries
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default storage key
pub const DEFAULT_QUEUE_KEY: &str = "failed_submissions";

/// A submission that exhausted its retries or failed terminally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSubmission {
    /// Time-ordered unique id (UUIDv7)
    pub id: String,
    pub form_type: String,
    pub form_data: serde_json::Value,
    pub error: SubmissionError,
    /// RFC 3339 UTC time the entry was queued
    pub timestamp: String,
}

/// Error context recorded with a failed submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub timestamp: String,
}

impl FailedSubmission {
    pub fn new(form_type: impl Into<String>, form_data: serde_json::Value, error: &CallError) -> Self {
        let now = now_rfc3339();
        Self {
            id: Uuid::now_v7().to_string(),
            form_type: form_type.into(),
            form_data,
            error: SubmissionError {
                message: error.message(),
                status: error.status(),
                timestamp: now.clone(),
            },
            timestamp: now,
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bounded, persisted list of [`FailedSubmission`]s
#[derive(Clone)]
pub struct FailureQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    max_entries: usize,
}

impl std::fmt::Debug for FailureQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureQueue")
            .field("key", &self.key)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl FailureQueue {
    /// `max_entries` is raised to 1 if given as 0
    pub fn new<S>(store: S, key: impl Into<String>, max_entries: usize) -> Self
    where
        S: KeyValueStore + 'static,
    {
        Self::with_shared_store(Arc::new(store), key, max_entries)
    }

    /// Build a queue over a store that other queues may also use
    pub fn with_shared_store(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        max_entries: usize,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            max_entries: max_entries.max(1),
        }
    }

    /// File-backed queue as described by the `[queue]` config section
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            FileStore::new(&config.store_dir),
            config.key.clone(),
            config.max_entries,
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Append a failed submission, evicting the oldest entries beyond capacity.
    pub fn push(&self, form_type: &str, form_data: serde_json::Value, error: &CallError) {
        let entry = FailedSubmission::new(form_type, form_data, error);
        let id = entry.id.clone();

        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    key = %self.key,
                    id = %id,
                    form_type,
                    error = %e,
                    "Failed to read failure queue, submission not queued"
                );
                return;
            }
        };
        entries.push(entry);
        let evicted = entries.len().saturating_sub(self.max_entries);
        if evicted > 0 {
            entries.drain(..evicted);
        }

        match self.write(&entries) {
            Ok(()) => info!(
                key = %self.key,
                id = %id,
                form_type,
                status = ?error.status(),
                queued = entries.len(),
                evicted,
                "Queued failed submission"
            ),
            Err(e) => error!(
                key = %self.key,
                form_type,
                error = %e,
                "Failed to persist failed submission"
            ),
        }
    }

    /// Current entries, oldest first. Missing, corrupt or unreadable state
    /// reads as empty.
    pub fn list(&self) -> Vec<FailedSubmission> {
        self.load().unwrap_or_else(|e| {
            error!(key = %self.key, error = %e, "Failed to read failure queue");
            Vec::new()
        })
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Remove the persisted key entirely
    pub fn clear(&self) {
        match self.store.remove(&self.key) {
            Ok(()) => info!(key = %self.key, "Cleared failure queue"),
            Err(e) => error!(key = %self.key, error = %e, "Failed to clear failure queue"),
        }
    }

    /// Pretty-printed JSON array of the current entries
    pub fn export(&self) -> String {
        serde_json::to_string_pretty(&self.list()).unwrap_or_else(|e| {
            error!(key = %self.key, error = %e, "Failed to serialize failure queue");
            "[]".to_string()
        })
    }

    /// Write [`export`](Self::export) output to `path`, returning the number of entries written.
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let entries = self.list();
        let json = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path.as_ref(), json).map_err(|source| StoreError::Io {
            key: self.key.clone(),
            source,
        })?;
        info!(
            key = %self.key,
            path = %path.as_ref().display(),
            entries = entries.len(),
            "Exported failure queue"
        );
        Ok(entries.len())
    }

    /// Missing and corrupt state load as empty; only a failed read is an error.
    fn load(&self) -> Result<Vec<FailedSubmission>, StoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key = %self.key, error = %e, "Failure queue is corrupt, treating as empty");
            Vec::new()
        }))
    }

    fn write(&self, entries: &[FailedSubmission]) -> Result<(), StoreError> {
        let json = serde_json::to_string(entries)?;
        self.store.set(&self.key, &json)
    }
}
