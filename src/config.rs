use crate::classify::{DEFAULT_ACCEPTED_STATUSES, DEFAULT_RETRYABLE_STATUSES};
use crate::error::ConfigError;
use crate::queue::{DEFAULT_MAX_ENTRIES, DEFAULT_QUEUE_KEY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retry budget and backoff bounds for one logical call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each following retry
    pub base_delay_ms: u64,
    /// Upper bound for any single backoff delay
    pub max_delay_ms: u64,
    /// HTTP statuses treated as transient
    pub retryable_statuses: BTreeSet<u16>,
    /// Per-attempt timeout. `None` leaves attempts unbounded.
    pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            attempt_timeout_ms: Some(30_000),
        }
    }
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts < 1 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        if self.base_delay_ms == 0 {
            return Err(ConfigError::ZeroBaseDelay);
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::DelayOrder {
                base: self.base_delay_ms,
                max: self.max_delay_ms,
            });
        }
        if self.attempt_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "retry.attempt_timeout_ms",
                reason: "must be greater than 0 when set".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Directory holding the file-backed key-value store
    pub store_dir: PathBuf,
    /// Storage key of the failed-submission list
    pub key: String,
    /// Most recent entries retained; older ones are evicted first
    pub max_entries: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./data"),
            key: DEFAULT_QUEUE_KEY.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub pool_idle_timeout_ms: u64,
    pub max_idle_per_host: usize,
    /// Non-2xx statuses returned to the caller as responses
    pub accepted_statuses: BTreeSet<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            pool_idle_timeout_ms: 60_000,
            max_idle_per_host: 10,
            accepted_statuses: DEFAULT_ACCEPTED_STATUSES.into_iter().collect(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_idle_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Optional log file; console only when absent
    pub file: Option<String>,
    /// JSON output for the file layer (or the console when no file is set)
    pub json: bool,
    /// Daily rotation of the log file
    pub rotation: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
            rotation: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config file, using defaults: {:#}", e);
            Self::default()
        })
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;

        if self.queue.max_entries == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.queue.key.trim().is_empty() {
            return Err(ConfigError::EmptyQueueKey);
        }
        if self.http.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "http.connect_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if let Some(status) = self
            .http
            .accepted_statuses
            .iter()
            .find(|s| !(100..=599).contains(*s))
        {
            return Err(ConfigError::Invalid {
                field: "http.accepted_statuses",
                reason: format!("{} is not an HTTP status code", status),
            });
        }
        if let Some(status) = self
            .http
            .accepted_statuses
            .intersection(&self.retry.retryable_statuses)
            .next()
        {
            return Err(ConfigError::Invalid {
                field: "http.accepted_statuses",
                reason: format!("{} is also listed as retryable", status),
            });
        }
        Ok(())
    }
}
