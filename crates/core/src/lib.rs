//! Core types, errors, and utilities for Herald.
//!
//! - [`Comment`]: the declared-state resource the controller converges
//! - [`ResourceKey`]: the canonical `namespace/name` identifier used as the
//!   unit of work and the cache lookup key
//! - [`Error`] / [`Result`]: errors shared by every crate in the workspace
//! - [`Shutdown`]: the process-wide stop signal

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod key;
pub mod resource;
pub mod result;
pub mod shutdown;

pub use error::{Error, Result};
pub use key::{KEY_SEPARATOR, ResourceKey};
pub use resource::{
    Comment, CommentSpec, CommentStatus, DEFAULT_API_VERSION, DEFAULT_KIND, ObjectMeta,
};
pub use result::ResultExt;
pub use shutdown::{Shutdown, ShutdownTrigger};
