//! Error types for the store crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error types.
#[derive(Debug, Error)]
pub enum Error {
    #[error("comment '{key}' not found")]
    NotFound { key: String },

    #[error("comment '{key}' already exists")]
    AlreadyExists { key: String },

    /// Optimistic concurrency check failed.
    #[error("conflict updating '{key}': object has resource version {actual}, update carried {expected}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Invalid(#[from] herald_core::Error),

    #[error("failed to read '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write '{path}': {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("failed to parse '{path}': {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("watch error: {reason}")]
    WatchFailed { reason: String },
}

impl Error {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    pub fn conflict(key: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            key: key.into(),
            expected,
            actual,
        }
    }

    pub fn read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn parse_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ParseFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn watch_failed(reason: impl Into<String>) -> Self {
        Self::WatchFailed {
            reason: reason.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let err = Error::conflict("default/c1", 3, 5);
        let text = err.to_string();
        assert!(text.contains("default/c1"));
        assert!(text.contains('3') && text.contains('5'));
        assert!(err.is_conflict());
    }
}
