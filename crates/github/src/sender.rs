//! The comment-posting seam.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::issue::IssueRef;

/// Posts a comment body on an issue.
#[async_trait]
pub trait CommentSender: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the comment was not accepted.
    async fn send(&self, target: &IssueRef, body: &str) -> Result<()>;
}

/// Logs instead of posting.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSender;

#[async_trait]
impl CommentSender for DryRunSender {
    async fn send(&self, target: &IssueRef, body: &str) -> Result<()> {
        info!(target = %target, body, "Dry run, comment not posted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let target: IssueRef = "octo/repo#1".parse().unwrap();
        assert!(DryRunSender.send(&target, "hello").await.is_ok());
    }
}
