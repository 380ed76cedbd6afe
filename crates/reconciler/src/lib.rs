//! Level-triggered reconciliation of `Comment` resources.
//!
//! Every `Comment` whose status is not yet `created` is posted once on the
//! configured GitHub issue, after which its status is written back to the
//! store. The pieces:
//!
//! - **[`EnqueueHandler`]**: turns informer notifications into queue keys,
//!   ignoring updates that change nothing
//! - **[`Reconciler`]**: reads the cached object, sends, records delivery
//! - **[`Controller`]**: waits for the cache to sync, then runs workers
//!   that drain the queue and requeue retryable failures with backoff
//!
//! # Delivery
//!
//! Delivery is at least once. A comment whose status update fails after a
//! successful send is sent again on retry.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use herald_core::shutdown;
//! use herald_github::DryRunSender;
//! use herald_informer::{DEFAULT_RESYNC_PERIOD, Informer};
//! use herald_reconciler::{Controller, ControllerConfig, ReconcilerBuilder};
//! use herald_store::InMemoryCommentApi;
//!
//! let api = Arc::new(InMemoryCommentApi::new());
//! let informer = Arc::new(Informer::new(api.clone(), DEFAULT_RESYNC_PERIOD));
//! let reconciler = ReconcilerBuilder::new()
//!     .with_lister(informer.lister())
//!     .with_api(api)
//!     .with_sender(Arc::new(DryRunSender))
//!     .target("octo/repo#1".parse()?)
//!     .build()?;
//!
//! let controller = Arc::new(Controller::new(Arc::new(reconciler), ControllerConfig::default())?);
//! let (trigger, signal) = shutdown::channel();
//! controller.run(informer, signal).await;
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod controller;
pub mod error;
pub mod reconciler;
pub mod types;

// Re-export main types
pub use controller::{Controller, ControllerConfig, EnqueueHandler};
pub use error::{Error, Result};
pub use reconciler::{DEFAULT_CALL_TIMEOUT, Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use types::ReconcileOutcome;
