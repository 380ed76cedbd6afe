//! Work queue with rate-limited requeue.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::queue::{QueueKey, WorkQueue};
use crate::rate_limiter::{ItemExponentialFailureRateLimiter, RateLimiter};

/// A [`WorkQueue`] whose failed items come back after a [`RateLimiter`]
/// delay.
pub struct RateLimitingQueue<T> {
    queue: WorkQueue<T>,
    limiter: Arc<dyn RateLimiter<T>>,
}

impl<T> Clone for RateLimitingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<T> fmt::Debug for RateLimitingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitingQueue")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<T: QueueKey> RateLimitingQueue<T> {
    pub fn new(name: impl Into<String>, limiter: Arc<dyn RateLimiter<T>>) -> Self {
        Self {
            queue: WorkQueue::new(name),
            limiter,
        }
    }

    /// Queue with per-item exponential backoff.
    pub fn with_exponential_backoff(
        name: impl Into<String>,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self::new(
            name,
            Arc::new(ItemExponentialFailureRateLimiter::new(base_delay, max_delay)),
        )
    }

    /// Queue with 5s base / 60s max exponential backoff.
    pub fn with_default_backoff(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(ItemExponentialFailureRateLimiter::default()))
    }

    pub fn add(&self, item: T) {
        self.queue.add(item);
    }

    pub async fn get(&self) -> Option<T> {
        self.queue.get().await
    }

    pub fn done(&self, item: &T) {
        self.queue.done(item);
    }

    pub fn add_after(&self, item: T, delay: Duration) {
        self.queue.add_after(item, delay);
    }

    /// Re-add `item` after its backoff delay and count one more failure.
    pub fn add_rate_limited(&self, item: T) {
        let delay = self.limiter.when(&item);
        debug!(
            queue = %self.queue.name(),
            ?item,
            ?delay,
            requeues = self.limiter.num_requeues(&item),
            "Requeueing with backoff"
        );
        self.queue.add_after(item, delay);
    }

    /// Reset the backoff of `item`. Does not remove it from the queue.
    pub fn forget(&self, item: &T) {
        self.limiter.forget(item);
    }

    pub fn num_requeues(&self, item: &T) -> u32 {
        self.limiter.num_requeues(item)
    }

    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    pub async fn shut_down_with_drain(&self) {
        self.queue.shut_down_with_drain().await;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_shutting_down()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn num_waiting(&self) -> usize {
        self.queue.num_waiting()
    }

    pub fn num_processing(&self) -> usize {
        self.queue.num_processing()
    }
}
