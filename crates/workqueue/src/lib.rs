//! Deduplicating, rate-limited work queue.
//!
//! The queue is the single choke point of a controller:
//!
//! - **Dedup**: a key added N times while pending is handed out once
//! - **One in flight**: a key being processed is never handed to a second
//!   worker; adding it during processing re-queues it exactly once when
//!   [`WorkQueue::done`] is called
//! - **Backoff**: [`RateLimitingQueue::add_rate_limited`] re-adds a key after
//!   a per-key exponential delay, reset by [`RateLimitingQueue::forget`]
//!
//! # Example
//!
//! ```ignore
//! use herald_workqueue::RateLimitingQueue;
//!
//! let queue = RateLimitingQueue::<String>::with_default_backoff("comments");
//! queue.add("default/c1".to_string());
//!
//! while let Some(key) = queue.get().await {
//!     match process(&key).await {
//!         Ok(()) => queue.forget(&key),
//!         Err(_) => queue.add_rate_limited(key.clone()),
//!     }
//!     queue.done(&key);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod queue;
pub mod rate_limiter;
pub mod rate_limiting;

pub use queue::{QueueKey, WorkQueue};
pub use rate_limiter::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, ItemExponentialFailureRateLimiter, MaxOfRateLimiter,
    RateLimiter, backoff_delay,
};
pub use rate_limiting::RateLimitingQueue;
