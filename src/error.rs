/// Error types for remote calls, storage and configuration
use std::time::Duration;
use thiserror::Error;

/// Failure of a single call attempt.
///
/// Produced by [`crate::http::HttpCallAdapter`] (or any caller-supplied
/// operation) and consumed by [`crate::classify::is_retryable`]. The set of
/// variants is closed so classification is an exhaustive match.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Transport failure: DNS, connect, reset, TLS handshake
    #[error("Network error: {message}")]
    Network { message: String },

    /// The server answered with a non-2xx status that was not passed through
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The attempt did not finish within the per-attempt timeout
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,
}

impl CallError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures that never reached an HTTP response.
    /// Timeouts count as network failures.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Short human-readable description without the variant prefix
    pub fn message(&self) -> String {
        match self {
            Self::Network { message } | Self::Http { message, .. } => message.clone(),
            Self::Timeout { after } => format!("timed out after {}ms", after.as_millis()),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Key-value store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed
    #[error("Storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key contains characters that cannot be mapped to a storage slot
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },

    /// Value could not be serialized before writing
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1 (got {0})")]
    InvalidMaxAttempts(u32),

    #[error("base_delay_ms must be greater than 0")]
    ZeroBaseDelay,

    #[error("base_delay_ms ({base}) must not exceed max_delay_ms ({max})")]
    DelayOrder { base: u64, max: u64 },

    #[error("queue max_entries must be at least 1")]
    ZeroQueueCapacity,

    #[error("queue key must not be empty")]
    EmptyQueueKey,

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised while building a request
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request could not be assembled
    #[error("Invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

/// Outcome of a failed [`crate::submit::ResilientSubmitter::submit`]
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The request could not be built; nothing was sent or queued
    #[error(transparent)]
    InvalidRequest(#[from] ClientError),

    /// Every attempt failed or a terminal failure occurred; the payload was queued
    #[error("Submission failed: {0}")]
    Failed(#[from] CallError),
}
