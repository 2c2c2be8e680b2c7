use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for user-facing handling and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// Transient network or transport failure. Retryable.
    Network,
    /// Invalid input, surfaced as a user-visible message.
    Validation,
    /// Requested entity does not exist.
    NotFound,
    /// Authentication/authorization failure, propagated to session handling.
    Unauthorized,
    /// Internal bug or invariant break.
    Internal,
}

/// Stable error payload emitted across the command/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct SyncError {
    /// High-level error category.
    pub category: SyncErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl SyncError {
    /// Construct a new error.
    pub fn new(
        category: SyncErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a retry hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }

    /// Transient network failure.
    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(SyncErrorCategory::Network, code, message)
    }

    /// Non-retryable input validation failure.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(SyncErrorCategory::Validation, code, message)
    }

    /// Missing-entity failure.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SyncErrorCategory::NotFound, "not_found", message)
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category, SyncErrorCategory::Network)
    }
}

/// Map HTTP status codes to error categories.
pub fn classify_http_status(status: u16) -> SyncErrorCategory {
    match status {
        401 | 403 => SyncErrorCategory::Unauthorized,
        404 => SyncErrorCategory::NotFound,
        408 | 429 => SyncErrorCategory::Network,
        400..=499 => SyncErrorCategory::Validation,
        500..=599 => SyncErrorCategory::Network,
        _ => SyncErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_categories() {
        assert_eq!(classify_http_status(401), SyncErrorCategory::Unauthorized);
        assert_eq!(classify_http_status(404), SyncErrorCategory::NotFound);
        assert_eq!(classify_http_status(429), SyncErrorCategory::Network);
        assert_eq!(classify_http_status(422), SyncErrorCategory::Validation);
        assert_eq!(classify_http_status(503), SyncErrorCategory::Network);
        assert_eq!(classify_http_status(700), SyncErrorCategory::Internal);
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(SyncError::network("timeout", "request timed out").is_retryable());
        assert!(!SyncError::validation("term_too_short", "term too short").is_retryable());
        assert!(!SyncError::not_found("no such user").is_retryable());
    }

    #[test]
    fn persists_retry_after_in_millis() {
        let err =
            SyncError::network("rate_limited", "slow down").with_retry_after(Duration::from_secs(2));
        assert_eq!(err.retry_after_ms, Some(2000));
    }
}
