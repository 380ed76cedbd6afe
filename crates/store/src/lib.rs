//! Storage for `Comment` resources.
//!
//! - [`CommentApi`]: typed create/get/list/update/delete plus a watch stream,
//!   the contract the informer and reconciler consume
//! - [`InMemoryCommentApi`]: a store with a single monotonically increasing
//!   resource version, optionally persisted to a JSON state file
//! - [`ManifestLoader`]: applies a directory of YAML manifests to a store and
//!   re-applies it whenever the directory changes

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod error;
pub mod manifest;
pub mod memory;

pub use api::{CommentApi, CommentList, WatchEvent};
pub use error::{Error, Result};
pub use manifest::{ApplySummary, ManifestLoader};
pub use memory::InMemoryCommentApi;
