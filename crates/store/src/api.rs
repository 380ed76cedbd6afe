//! The store contract.

use async_trait::async_trait;
use herald_core::{Comment, ResourceKey};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// A change observed by the store, carrying the object at the change's
/// resource version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(Comment),
    Modified(Comment),
    Deleted(Comment),
}

impl WatchEvent {
    pub const fn object(&self) -> &Comment {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }

    pub const fn resource_version(&self) -> u64 {
        self.object().metadata.resource_version
    }
}

/// Point-in-time listing of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentList {
    /// Store version at the time of the listing.
    pub resource_version: u64,
    pub items: Vec<Comment>,
}

/// Typed client for `Comment` resources.
#[async_trait]
pub trait CommentApi: Send + Sync {
    /// Fetch one object.
    async fn get(&self, key: &ResourceKey) -> Result<Comment>;

    /// List every object.
    async fn list(&self) -> Result<CommentList>;

    /// Create a new object. Fails with `AlreadyExists` on a duplicate key.
    async fn create(&self, comment: Comment) -> Result<Comment>;

    /// Replace an existing object.
    ///
    /// A non-zero `resource_version` must match the stored one, otherwise
    /// the update fails with `Conflict`.
    async fn update(&self, comment: Comment) -> Result<Comment>;

    /// Delete an object, returning its last state.
    async fn delete(&self, key: &ResourceKey) -> Result<Comment>;

    /// Subscribe to changes made after this call.
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}
