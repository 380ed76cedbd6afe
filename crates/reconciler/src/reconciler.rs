//! Reconciler implementation.

use std::sync::Arc;
use std::time::Duration;

use herald_core::ResourceKey;
use herald_github::{CommentSender, IssueRef};
use herald_informer::CommentLister;
use herald_store::CommentApi;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::ReconcileOutcome;

/// Default deadline for each external call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Issue every comment is posted on.
    pub target: IssueRef,
    /// Deadline for the send and for the status update, each.
    pub call_timeout: Duration,
}

impl ReconcilerConfig {
    pub const fn new(target: IssueRef) -> Self {
        Self {
            target,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Drives one `Comment` from undelivered to delivered.
///
/// Reads come from the informer cache, writes go to the store. Delivery is
/// at least once: if the status update fails after a successful send, the
/// retry sends again.
pub struct Reconciler {
    lister: Arc<dyn CommentLister>,
    api: Arc<dyn CommentApi>,
    sender: Arc<dyn CommentSender>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        lister: Arc<dyn CommentLister>,
        api: Arc<dyn CommentApi>,
        sender: Arc<dyn CommentSender>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            lister,
            api,
            sender,
            config,
        }
    }

    /// Reconcile the object named by a `namespace/name` queue key.
    ///
    /// # Errors
    ///
    /// A malformed key is not retryable. A failed or timed-out send or
    /// status update is retryable and leaves the status unchanged in the
    /// store.
    pub async fn reconcile(&self, key: &str) -> Result<ReconcileOutcome> {
        let parsed: ResourceKey = key
            .parse()
            .map_err(|e: herald_core::Error| Error::invalid_key(key, e.to_string()))?;

        let Some(cached) = self.lister.get(&parsed) else {
            debug!(key, "Not in cache, skipping");
            return Ok(ReconcileOutcome::NotFound);
        };

        if cached.is_created() {
            debug!(key, "Already delivered");
            return Ok(ReconcileOutcome::AlreadyDelivered);
        }

        let deadline = self.config.call_timeout;

        tokio::time::timeout(
            deadline,
            self.sender.send(&self.config.target, &cached.spec.message),
        )
        .await
        .map_err(|_| Error::timeout(key, "send", deadline))?
        .map_err(|e| Error::send_failed(key, e.to_string()))?;

        let delivered = (*cached).clone().delivered();
        let stored = tokio::time::timeout(deadline, self.api.update(delivered))
            .await
            .map_err(|_| Error::timeout(key, "status update", deadline))?
            .map_err(|e| Error::status_update_failed(key, e.to_string()))?;

        info!(
            key,
            target = %self.config.target,
            version = stored.resource_version(),
            "Comment delivered"
        );
        Ok(ReconcileOutcome::Delivered)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
#[derive(Default)]
pub struct ReconcilerBuilder {
    lister: Option<Arc<dyn CommentLister>>,
    api: Option<Arc<dyn CommentApi>>,
    sender: Option<Arc<dyn CommentSender>>,
    target: Option<IssueRef>,
    call_timeout: Option<Duration>,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache to read from.
    #[must_use]
    pub fn with_lister(mut self, lister: Arc<dyn CommentLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    /// Set the store to write status to.
    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn CommentApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the comment sender.
    #[must_use]
    pub fn with_sender(mut self, sender: Arc<dyn CommentSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Set the target issue.
    #[must_use]
    pub fn target(mut self, target: IssueRef) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the per-call deadline.
    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator or the target is missing, or the
    /// call timeout is zero.
    pub fn build(self) -> Result<Reconciler> {
        let lister = self
            .lister
            .ok_or_else(|| Error::invalid_config("lister is required"))?;
        let api = self
            .api
            .ok_or_else(|| Error::invalid_config("store API is required"))?;
        let sender = self
            .sender
            .ok_or_else(|| Error::invalid_config("comment sender is required"))?;
        let target = self
            .target
            .ok_or_else(|| Error::invalid_config("target issue is required"))?;

        let mut config = ReconcilerConfig::new(target);
        if let Some(timeout) = self.call_timeout {
            if timeout.is_zero() {
                return Err(Error::invalid_config("call timeout must be positive"));
            }
            config.call_timeout = timeout;
        }

        Ok(Reconciler::new(lister, api, sender, config))
    }
}
