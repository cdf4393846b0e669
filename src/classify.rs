//! Failure classification and response pass-through policy

use crate::error::CallError;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Statuses retried by default: request timeout, rate limiting and gateway/server faults.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Statuses passed back to the caller as responses by default.
/// 409 (conflict) and 422 (validation/duplicate) mean the server understood the request.
pub const DEFAULT_ACCEPTED_STATUSES: [u16; 2] = [409, 422];

/// Decide whether a failed attempt may be retried.
///
/// Network failures (timeouts included) are always retryable. HTTP failures
/// are retryable only when their status is in `retryable_statuses`.
/// Cancellation is never retryable.
pub fn is_retryable(error: &CallError, retryable_statuses: &BTreeSet<u16>) -> bool {
    match error {
        CallError::Network { .. } | CallError::Timeout { .. } => true,
        CallError::Http { status, .. } => retryable_statuses.contains(status),
        CallError::Cancelled => false,
    }
}

/// Predicate selecting non-2xx statuses that are returned to the caller
/// as ordinary responses instead of being raised as [`CallError::Http`].
#[derive(Clone)]
pub struct AcceptPolicy {
    predicate: Arc<dyn Fn(u16) -> bool + Send + Sync>,
}

impl AcceptPolicy {
    /// Build a policy from an arbitrary predicate
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Accept exactly the given statuses
    pub fn statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        let set: BTreeSet<u16> = statuses.into_iter().collect();
        Self::new(move |status| set.contains(&status))
    }

    /// Never pass a non-2xx status through
    pub fn none() -> Self {
        Self::new(|_| false)
    }

    /// Whether a response with `status` is handed back to the caller
    pub fn accepts(&self, status: u16) -> bool {
        (200..300).contains(&status) || (self.predicate)(status)
    }
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self::statuses(DEFAULT_ACCEPTED_STATUSES)
    }
}

impl fmt::Debug for AcceptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceptPolicy")
            .field("predicate", &"<fn>")
            .finish()
    }
}

