//! Error types for the reconciler crate.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Queue key is not `namespace/name`.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Comment could not be posted.
    #[error("failed to send comment for '{key}': {reason}")]
    SendFailed { key: String, reason: String },

    /// Comment was posted but the delivered status could not be stored.
    #[error("failed to update status of '{key}': {reason}")]
    StatusUpdateFailed { key: String, reason: String },

    /// An external call exceeded its deadline.
    #[error("{operation} for '{key}' timed out after {timeout_ms}ms")]
    Timeout {
        key: String,
        operation: String,
        timeout_ms: u64,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a send failed error.
    pub fn send_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a status update failed error.
    pub fn status_update_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StatusUpdateFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(key: impl Into<String>, operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            key: key.into(),
            operation: operation.into(),
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the item should be requeued with backoff.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SendFailed { .. } | Self::StatusUpdateFailed { .. } | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::send_failed("default/c1", "connection reset");
        assert!(err.to_string().contains("default/c1"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout("default/c1", "send", Duration::from_secs(30));
        assert_eq!(err.to_string(), "send for 'default/c1' timed out after 30000ms");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::send_failed("k", "x").is_retryable());
        assert!(Error::status_update_failed("k", "x").is_retryable());
        assert!(Error::timeout("k", "send", Duration::from_secs(1)).is_retryable());
        assert!(!Error::invalid_key("k", "x").is_retryable());
        assert!(!Error::invalid_config("x").is_retryable());
    }
}
