//! Unified error handling for the sync runner.
//!
//! The taxonomy separates retryable infrastructure failures
//! (`*Unavailable`, `*RateLimited`) from per-record data problems
//! (`SourceMalformed`, `WriteRejected`). Normalization skips stay inside
//! `playlog_engine::Error` and configuration problems inside
//! `ConfigError`; neither flows through a sync unit.

use thiserror::Error;

/// All error kinds a sync run can produce.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source service network failure, 5xx, or timeout. Retryable.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Source service throttling. Retryable with backoff.
    #[error("source rate limited (retry after {retry_after:?}s)")]
    SourceRateLimited {
        /// Seconds to wait, when the service said so
        retry_after: Option<u64>,
    },

    /// Unparsable source payload. A data error for that page, not retryable.
    #[error("source payload malformed: {0}")]
    SourceMalformed(String),

    /// The destination refused a write as invalid. Per-record, not retryable.
    #[error("destination rejected write: {0}")]
    WriteRejected(String),

    /// Destination network failure, 5xx, or timeout. Retryable.
    #[error("destination unavailable: {0}")]
    DestinationUnavailable(String),

    /// Destination throttling. Retryable with backoff.
    #[error("destination rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        /// Seconds to wait, when the store said so
        retry_after: Option<u64>,
    },

    /// Operator-requested stop observed between records.
    #[error("sync cancelled by operator")]
    Cancelled,
}

impl SyncError {
    /// Whether the call site should retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_)
                | SyncError::SourceRateLimited { .. }
                | SyncError::DestinationUnavailable(_)
                | SyncError::RateLimited { .. }
        )
    }

    /// Server-suggested wait in seconds, for throttling responses.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            SyncError::SourceRateLimited { retry_after } => *retry_after,
            SyncError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for the sync runner.
pub type Result<T> = std::result::Result<T, SyncError>;
