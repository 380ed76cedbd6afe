//! Deduplicating FIFO work queue with delayed adds.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Bounds required of a queue item.
pub trait QueueKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> QueueKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Queue bookkeeping. Every field is guarded by the one mutex in [`Shared`].
///
/// Invariants:
/// - every item in `queue` is also in `dirty`
/// - an item in `processing` is never in `queue`
/// - an item in `dirty` and `processing` is re-queued by `done`
struct State<T> {
    queue: VecDeque<T>,
    dirty: HashSet<T>,
    processing: HashSet<T>,
    /// Delayed adds: item -> ready time of the earliest pending timer.
    waiting: HashMap<T, Instant>,
    shutting_down: bool,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            waiting: HashMap::new(),
            shutting_down: false,
        }
    }
}

struct Shared<T> {
    name: String,
    state: Mutex<State<T>>,
    /// Signalled when an item becomes available or on shutdown.
    available: Notify,
    /// Signalled when the processing set drains.
    idle: Notify,
}

/// A work queue that collapses duplicate pending items and never hands out
/// an item that is still being processed.
///
/// Cloning is cheap; clones share the same queue.
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl<T: QueueKey> WorkQueue<T> {
    /// Create an empty queue. The name only appears in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                state: Mutex::new(State::default()),
                available: Notify::new(),
                idle: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `item` as needing processing.
    ///
    /// No-op if the item is already pending or the queue is shutting down.
    /// If the item is being processed it is re-queued when [`Self::done`] is
    /// called for it.
    pub fn add(&self, item: T) {
        {
            let mut state = self.lock();
            if state.shutting_down {
                trace!(queue = %self.shared.name, ?item, "Ignoring add after shutdown");
                return;
            }
            if !state.dirty.insert(item.clone()) {
                return;
            }
            if state.processing.contains(&item) {
                trace!(queue = %self.shared.name, ?item, "Item in flight, marked dirty");
                return;
            }
            state.queue.push_back(item);
        }
        self.shared.available.notify_one();
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the queue is shutting down and no pending items
    /// remain; items queued before shutdown are still handed out. The
    /// returned item is marked as processing until [`Self::done`] is called.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Registered before inspecting state so a concurrent add or
            // shutdown cannot slip between the check and the wait.
            let mut notified = pin!(self.shared.available.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark `item` as finished processing.
    ///
    /// If it was added again while in flight it goes back on the queue.
    pub fn done(&self, item: &T) {
        let (requeued, idle) = {
            let mut state = self.lock();
            state.processing.remove(item);
            let requeued = state.dirty.contains(item);
            if requeued {
                state.queue.push_back(item.clone());
            }
            (requeued, state.processing.is_empty())
        };

        if requeued {
            self.shared.available.notify_one();
        }
        if idle {
            self.shared.idle.notify_waiters();
        }
    }

    /// Add `item` once `delay` has elapsed.
    ///
    /// If the item is already waiting, the earlier ready time wins. Must be
    /// called from within a Tokio runtime; without one the item is added
    /// immediately.
    pub fn add_after(&self, item: T, delay: Duration) {
        if delay.is_zero() {
            self.add(item);
            return;
        }

        let Some(ready_at) = Instant::now().checked_add(delay) else {
            warn!(queue = %self.shared.name, ?item, ?delay, "Delay out of range, dropping item");
            return;
        };

        {
            let mut state = self.lock();
            if state.shutting_down {
                return;
            }
            if state
                .waiting
                .get(&item)
                .is_some_and(|existing| *existing <= ready_at)
            {
                return;
            }
            state.waiting.insert(item.clone(), ready_at);
        }

        let Ok(handle) = Handle::try_current() else {
            warn!(queue = %self.shared.name, ?item, "No runtime for delayed add, adding now");
            self.lock().waiting.remove(&item);
            self.add(item);
            return;
        };

        debug!(queue = %self.shared.name, ?item, ?delay, "Scheduling delayed add");
        let queue = self.clone();
        handle.spawn(async move {
            tokio::time::sleep_until(ready_at).await;
            queue.fire_waiting(item, ready_at);
        });
    }

    /// Move a waiting item onto the queue if its timer is still current.
    fn fire_waiting(&self, item: T, ready_at: Instant) {
        let due = {
            let mut state = self.lock();
            let current = state.waiting.get(&item) == Some(&ready_at);
            if current {
                state.waiting.remove(&item);
            }
            current
        };
        if due {
            self.add(item);
        }
    }

    /// Stop accepting new items and wake every blocked [`Self::get`].
    ///
    /// Pending items are still handed out; delayed adds are discarded.
    pub fn shut_down(&self) {
        {
            let mut state = self.lock();
            state.shutting_down = true;
            state.waiting.clear();
        }
        debug!(queue = %self.shared.name, "Work queue shutting down");
        self.shared.available.notify_waiters();
    }

    /// [`Self::shut_down`], then wait until no item is being processed.
    pub async fn shut_down_with_drain(&self) {
        self.shut_down();
        loop {
            let mut idle = pin!(self.shared.idle.notified());
            idle.as_mut().enable();

            if self.lock().processing.is_empty() {
                return;
            }
            idle.await;
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of items waiting to be handed out.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items scheduled by [`Self::add_after`] and not yet added.
    pub fn num_waiting(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Number of items currently handed out and not yet marked done.
    pub fn num_processing(&self) -> usize {
        self.lock().processing.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const BLOCKED: Duration = Duration::from_millis(50);

    async fn assert_blocked(queue: &WorkQueue<String>) {
        let result = tokio::time::timeout(BLOCKED, queue.get()).await;
        assert!(result.is_err(), "get() returned {result:?}, expected to block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_adds_collapse() {
        let queue = WorkQueue::new("test");
        queue.add("default/c1".to_string());
        queue.add("default/c1".to_string());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await.as_deref(), Some("default/c1"));
        assert_blocked(&queue).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order() {
        let queue = WorkQueue::new("test");
        queue.add("a/1".to_string());
        queue.add("a/2".to_string());
        queue.add("a/1".to_string());

        assert_eq!(queue.get().await.as_deref(), Some("a/1"));
        assert_eq!(queue.get().await.as_deref(), Some("a/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_while_processing_requeues_once_after_done() {
        let queue = WorkQueue::new("test");
        queue.add("default/c1".to_string());
        let key = queue.get().await.unwrap();

        queue.add(key.clone());
        queue.add(key.clone());
        assert_eq!(queue.len(), 0, "in-flight item must not be queued");
        assert_blocked(&queue).await;

        queue.done(&key);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await, Some(key.clone()));

        queue.done(&key);
        assert!(queue.is_empty());
        assert_blocked(&queue).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_readd_does_not_requeue() {
        let queue = WorkQueue::new("test");
        queue.add("default/c1".to_string());
        let key = queue.get().await.unwrap();
        queue.done(&key);

        assert!(queue.is_empty());
        assert_eq!(queue.num_processing(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_hands_out_pending_then_stops() {
        let queue = WorkQueue::new("test");
        queue.add("default/c1".to_string());
        queue.shut_down();
        queue.add("default/c2".to_string());

        assert_eq!(queue.get().await.as_deref(), Some("default/c1"));
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_wakes_blocked_workers() {
        let queue: WorkQueue<String> = WorkQueue::new("test");
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.get().await })
            })
            .collect();

        tokio::time::sleep(BLOCKED).await;
        queue.shut_down();

        for worker in workers {
            assert_eq!(worker.await.unwrap(), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_wakes_blocked_worker() {
        let queue: WorkQueue<String> = WorkQueue::new("test");
        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        tokio::time::sleep(BLOCKED).await;
        queue.add("default/c1".to_string());

        assert_eq!(worker.await.unwrap().as_deref(), Some("default/c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after_delays_item() {
        let queue = WorkQueue::new("test");
        queue.add_after("default/c1".to_string(), Duration::from_secs(5));

        assert_eq!(queue.num_waiting(), 1);
        assert!(queue.is_empty());

        let start = Instant::now();
        assert_eq!(queue.get().await.as_deref(), Some("default/c1"));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(queue.num_waiting(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after_earlier_ready_time_wins() {
        let queue = WorkQueue::new("test");
        queue.add_after("default/c1".to_string(), Duration::from_secs(10));
        queue.add_after("default/c1".to_string(), Duration::from_secs(30));
        queue.add_after("default/c1".to_string(), Duration::from_secs(2));

        let start = Instant::now();
        let key = queue.get().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(10));
        queue.done(&key);

        // Superseded timers must not re-add the item.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after_zero_is_immediate() {
        let queue = WorkQueue::new("test");
        queue.add_after("default/c1".to_string(), Duration::ZERO);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_delayed_items() {
        let queue = WorkQueue::new("test");
        queue.add_after("default/c1".to_string(), Duration::from_secs(1));
        queue.shut_down();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_with_drain_waits_for_processing() {
        let queue = WorkQueue::new("test");
        queue.add("default/c1".to_string());
        let key = queue.get().await.unwrap();

        let drain = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.shut_down_with_drain().await })
        };

        tokio::time::sleep(BLOCKED).await;
        assert!(!drain.is_finished());

        queue.done(&key);
        drain.await.unwrap();
        assert!(queue.is_shutting_down());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_key_is_processed_concurrently() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let queue: WorkQueue<String> = WorkQueue::new("test");
        let in_flight = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let in_flight = Arc::clone(&in_flight);
                let violations = Arc::clone(&violations);
                tokio::spawn(async move {
                    while let Some(key) = queue.get().await {
                        if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                        tokio::task::yield_now().await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        queue.done(&key);
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            queue.add("default/hot".to_string());
            tokio::task::yield_now().await;
        }
        queue.shut_down_with_drain().await;

        for worker in workers {
            worker.await.unwrap();
        }
        assert_eq!(violations.load(Ordering::SeqCst), 0);
    }
}
