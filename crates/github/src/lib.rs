//! Posting comments on GitHub issues and pull requests.
//!
//! [`CommentSender`] is the seam the reconciler depends on. [`GithubClient`]
//! talks to the REST API; [`DryRunSender`] only logs.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod error;
pub mod issue;
pub mod sender;

pub use client::{DEFAULT_API_BASE, DEFAULT_USER_AGENT, GithubClient, GithubConfig};
pub use error::{Error, Result};
pub use issue::IssueRef;
pub use sender::{CommentSender, DryRunSender};
