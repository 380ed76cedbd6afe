#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # Herald
//!
//! Level-triggered controller that posts `Comment` resources as GitHub
//! issue comments.
//!
//! This library holds the binary's command line and configuration; the
//! workspace crates are re-exported for convenience.

pub use herald_core;
pub use herald_github;
pub use herald_informer;
pub use herald_reconciler;
pub use herald_store;

pub mod cli;
pub mod config;
