//! Per-item retry delay policies.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Initial delay after the first failure of an item.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on any computed delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Decides how long an item waits before it is retried.
pub trait RateLimiter<T>: Send + Sync {
    /// Delay before `item` is retried. Records one more failure.
    fn when(&self, item: &T) -> Duration;

    /// Clear all failure history for `item`.
    fn forget(&self, item: &T);

    /// Consecutive failures recorded for `item`.
    fn num_requeues(&self, item: &T) -> u32;
}

/// `min(max_delay, base_delay * 2^failures)`, saturating at `max_delay`.
pub fn backoff_delay(base_delay: Duration, max_delay: Duration, failures: u32) -> Duration {
    2_u32
        .checked_pow(failures)
        .and_then(|factor| base_delay.checked_mul(factor))
        .map_or(max_delay, |delay| delay.min(max_delay))
}

/// Exponential backoff tracked per item.
///
/// The n-th consecutive failure (counting from zero) waits
/// `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug)]
pub struct ItemExponentialFailureRateLimiter<T> {
    failures: Mutex<HashMap<T, u32>>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Eq + Hash + Clone> ItemExponentialFailureRateLimiter<T> {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            base_delay,
            max_delay,
        }
    }

    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<T, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Eq + Hash + Clone> Default for ItemExponentialFailureRateLimiter<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl<T: Eq + Hash + Clone + Send + Sync> RateLimiter<T> for ItemExponentialFailureRateLimiter<T> {
    fn when(&self, item: &T) -> Duration {
        let mut failures = self.lock();
        let count = failures.entry(item.clone()).or_insert(0);
        let exponent = *count;
        *count = count.saturating_add(1);
        backoff_delay(self.base_delay, self.max_delay, exponent)
    }

    fn forget(&self, item: &T) {
        self.lock().remove(item);
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.lock().get(item).copied().unwrap_or(0)
    }
}

/// Combines limiters, taking the worst delay.
pub struct MaxOfRateLimiter<T> {
    limiters: Vec<Box<dyn RateLimiter<T>>>,
}

impl<T> MaxOfRateLimiter<T> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<T>>>) -> Self {
        Self { limiters }
    }
}

impl<T> RateLimiter<T> for MaxOfRateLimiter<T> {
    fn when(&self, item: &T) -> Duration {
        // Every limiter must see the failure, so no short-circuiting.
        self.limiters
            .iter()
            .map(|limiter| limiter.when(item))
            .fold(Duration::ZERO, Duration::max)
    }

    fn forget(&self, item: &T) {
        for limiter in &self.limiters {
            limiter.forget(item);
        }
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(item))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ItemExponentialFailureRateLimiter<String> {
        ItemExponentialFailureRateLimiter::default()
    }

    #[test]
    fn test_exponential_sequence() {
        let limiter = limiter();
        let key = "default/c1".to_string();

        let delays: Vec<u64> = (0..6).map(|_| limiter.when(&key).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
        assert_eq!(limiter.num_requeues(&key), 6);
    }

    #[test]
    fn test_forget_resets_backoff() {
        let limiter = limiter();
        let key = "default/c1".to_string();

        limiter.when(&key);
        limiter.when(&key);
        limiter.when(&key);
        limiter.forget(&key);

        assert_eq!(limiter.num_requeues(&key), 0);
        assert_eq!(limiter.when(&key), DEFAULT_BASE_DELAY);
    }

    #[test]
    fn test_items_are_tracked_independently() {
        let limiter = limiter();
        let a = "default/a".to_string();
        let b = "default/b".to_string();

        limiter.when(&a);
        limiter.when(&a);

        assert_eq!(limiter.when(&b), DEFAULT_BASE_DELAY);
        assert_eq!(limiter.num_requeues(&a), 2);
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let delay = backoff_delay(Duration::from_secs(5), Duration::from_secs(60), u32::MAX);
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn test_max_of_takes_worst_delay() {
        let fast = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1000),
        );
        let slow = ItemExponentialFailureRateLimiter::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        let limiter = MaxOfRateLimiter::new(vec![Box::new(fast), Box::new(slow)]);
        let key = "default/c1".to_string();

        assert_eq!(limiter.when(&key), Duration::from_secs(1));
        assert_eq!(limiter.when(&key), Duration::from_secs(2));
        assert_eq!(limiter.num_requeues(&key), 2);

        limiter.forget(&key);
        assert_eq!(limiter.num_requeues(&key), 0);
    }
}
