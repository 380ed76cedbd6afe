//! Error types for the GitHub client.

use thiserror::Error;

/// Result type for GitHub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while posting a comment.
#[derive(Error, Debug)]
pub enum Error {
    /// Target string is not `owner/repo#number`.
    #[error("invalid issue reference '{input}': {reason}")]
    InvalidIssueRef { input: String, reason: String },

    /// API base URL cannot carry a path.
    #[error("invalid API base URL '{url}'")]
    InvalidBaseUrl { url: String },

    /// Non-success response from the API.
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {reason}")]
    ClientInit { reason: String },

    /// Transport error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an invalid issue reference error.
    pub fn invalid_issue_ref(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIssueRef {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid base URL error.
    pub fn invalid_base_url(url: impl Into<String>) -> Self {
        Self::InvalidBaseUrl { url: url.into() }
    }

    /// Create an API error.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a client init error.
    pub fn client_init(reason: impl Into<String>) -> Self {
        Self::ClientInit {
            reason: reason.into(),
        }
    }

    /// HTTP status of an API error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
