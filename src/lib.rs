pub mod backoff;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod submit;

// Re-export commonly used types for convenience
pub use classify::{AcceptPolicy, is_retryable};
pub use config::{AppConfig, HttpConfig, QueueConfig, RetryConfig};
pub use error::{CallError, SubmitError};
pub use http::{CallRequest, CallResponse, HttpCallAdapter};
pub use queue::{FailedSubmission, FailureQueue, FileStore, KeyValueStore, MemoryStore};
pub use retry::{RetryExecutor, Sleeper, TokioSleeper};
pub use submit::ResilientSubmitter;
