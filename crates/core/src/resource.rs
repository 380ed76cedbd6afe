//! The `Comment` resource.
//!
//! Wire form (YAML or JSON, camelCase):
//!
//! ```yaml
//! apiVersion: github.herald.dev/v1
//! kind: Comment
//! metadata:
//!   namespace: default
//!   name: c1
//! spec:
//!   message: hi
//! status:
//!   delivered: false
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::ResourceKey;

/// API group/version written into new resources.
pub const DEFAULT_API_VERSION: &str = "github.herald.dev/v1";

/// Resource kind.
pub const DEFAULT_KIND: &str = "Comment";

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    /// Store-assigned version; zero means "unset".
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// Declared state: what to deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSpec {
    pub message: String,
}

/// Observed state written back by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentStatus {
    /// Whether the comment has been delivered. Written as `delivered`;
    /// `created` is accepted on read.
    #[serde(default, rename = "delivered", alias = "created")]
    pub created: bool,
}

/// A comment that should be posted exactly once (at least once under retry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: CommentSpec,
    #[serde(default)]
    pub status: CommentStatus,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

impl Comment {
    /// Create an undelivered comment.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                namespace: namespace.into(),
                name: name.into(),
                ..ObjectMeta::default()
            },
            spec: CommentSpec {
                message: message.into(),
            },
            status: CommentStatus::default(),
        }
    }

    /// Mark the comment as already delivered.
    #[must_use]
    pub const fn delivered(mut self) -> Self {
        self.status.created = true;
        self
    }

    /// The canonical key of this object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] if the metadata does not form a
    /// valid key.
    pub fn key(&self) -> Result<ResourceKey> {
        ResourceKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Check the type header and key of a decoded manifest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidResource`] for a foreign `apiVersion`
    /// or `kind`, and [`crate::Error::InvalidKey`] for bad metadata.
    pub fn validate(&self) -> Result<ResourceKey> {
        if self.api_version != DEFAULT_API_VERSION {
            return Err(Error::invalid_resource(format!(
                "unsupported apiVersion '{}', expected '{DEFAULT_API_VERSION}'",
                self.api_version
            )));
        }
        if self.kind != DEFAULT_KIND {
            return Err(Error::invalid_resource(format!(
                "unsupported kind '{}', expected '{DEFAULT_KIND}'",
                self.kind
            )));
        }
        self.key()
    }

    pub const fn resource_version(&self) -> u64 {
        self.metadata.resource_version
    }

    pub const fn is_created(&self) -> bool {
        self.status.created
    }
}
