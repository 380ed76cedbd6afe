//! Local cache and change notifications for `Comment` resources.
//!
//! An [`Informer`] lists the store, keeps a [`Cache`] current from the watch
//! stream, and calls every registered [`ResourceEventHandler`] on add, update,
//! and delete. Every resync period it re-delivers each cached object as an
//! update with identical old and new snapshots.
//!
//! Consumers must not act on the cache before [`wait_for_cache_sync`]
//! resolves: until the first list completes the cache is incomplete.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cache;
pub mod handler;
pub mod informer;

pub use cache::{Cache, CommentLister};
pub use handler::ResourceEventHandler;
pub use informer::{DEFAULT_RESYNC_PERIOD, Informer, wait_for_cache_sync};
