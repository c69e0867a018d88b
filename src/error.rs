//! Error types for the fetchguard resilience layer.

use std::time::Duration;

/// Errors raised by the cache storage backends.
///
/// Storage failures are always recovered locally by the cache tiers and
/// degrade to a miss; they surface here only for logging and metrics.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying storage could not be read or written
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized or deserialized
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backend refused the write (quota or capacity)
    #[error("storage quota exceeded")]
    QuotaExceeded,
}

/// Resilience layer error types
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Upstream responded 429; triggers the queue-wide backoff window
    #[error("rate limited by upstream (retry after {retry_after:?})")]
    RateLimited {
        /// Parsed `Retry-After` header, when the upstream sent one
        retry_after: Option<Duration>,
    },

    /// Upstream responded 5xx; triggers a short dispatch pause
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    /// The operation did not complete within its own deadline
    #[error("request timed out")]
    Timeout,

    /// Response body could not be decoded as its declared content type
    #[error("failed to decode response body")]
    MalformedResponse,

    /// The queue's pending list is at capacity
    #[error("queue is full (max pending: {max})")]
    QueueFull { max: usize },

    /// Cache storage failure (best-effort, normally recovered as a miss)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Request or response payload serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP failure
    #[error("http error: {0}")]
    Http(reqwest::Error),
}

impl FetchError {
    /// Classify an upstream status code into an error.
    ///
    /// Returns `None` for statuses that are not errors at this layer.
    pub fn from_status(status: u16, body: String) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited { retry_after: None }),
            500..=599 => Some(Self::ServerError { status, body }),
            _ => None,
        }
    }

    /// Whether a retry layer should attempt this operation again.
    ///
    /// Rate limits, server errors and timeouts are transient; everything
    /// else (malformed bodies, full queues, storage trouble) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::Timeout
        ) || matches!(self, Self::Http(e) if e.is_timeout() || e.is_connect())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}
