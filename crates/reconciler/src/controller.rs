//! Worker pool draining the queue into the reconciler.

use std::sync::Arc;
use std::time::Duration;

use herald_core::{Comment, Shutdown};
use herald_informer::{Informer, ResourceEventHandler, wait_for_cache_sync};
use herald_workqueue::{DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, RateLimitingQueue};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::reconciler::{DEFAULT_CALL_TIMEOUT, Reconciler};
use crate::types::ReconcileOutcome;

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Concurrent worker tasks.
    pub workers: usize,
    /// Requeue delay after the first failure of a key.
    pub base_delay: Duration,
    /// Upper bound on the requeue delay.
    pub max_delay: Duration,
    /// Deadline for each external call.
    pub call_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl ControllerConfig {
    /// # Errors
    ///
    /// Returns an error if there are no workers, the base delay is zero or
    /// exceeds the maximum, or the call timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid_config("workers must be at least 1"));
        }
        if self.base_delay.is_zero() {
            return Err(Error::invalid_config("base delay must be positive"));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::invalid_config(format!(
                "base delay {:?} exceeds max delay {:?}",
                self.base_delay, self.max_delay
            )));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::invalid_config("call timeout must be positive"));
        }
        Ok(())
    }
}

/// Enqueues the key of every changed object.
///
/// Updates whose old and new snapshots are equal, as on resync, are
/// dropped.
#[derive(Debug, Clone)]
pub struct EnqueueHandler {
    queue: RateLimitingQueue<String>,
}

impl EnqueueHandler {
    pub const fn new(queue: RateLimitingQueue<String>) -> Self {
        Self { queue }
    }

    fn enqueue(&self, obj: &Comment) {
        match obj.key() {
            Ok(key) => self.queue.add(key.to_string()),
            Err(e) => warn!(error = %e, "Object has no valid key, not queued"),
        }
    }
}

impl ResourceEventHandler for EnqueueHandler {
    fn on_add(&self, obj: &Comment) {
        self.enqueue(obj);
    }

    fn on_update(&self, old: &Comment, new: &Comment) {
        if old != new {
            self.enqueue(new);
        }
    }

    fn on_delete(&self, obj: &Comment) {
        self.enqueue(obj);
    }
}

/// Runs the reconciler for every queued key.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    queue: RateLimitingQueue<String>,
    config: ControllerConfig,
}

impl Controller {
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn new(reconciler: Arc<Reconciler>, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let queue = RateLimitingQueue::with_exponential_backoff(
            "comments",
            config.base_delay,
            config.max_delay,
        );
        Ok(Self {
            reconciler,
            queue,
            config,
        })
    }

    pub const fn queue(&self) -> &RateLimitingQueue<String> {
        &self.queue
    }

    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn event_handler(&self) -> Arc<dyn ResourceEventHandler> {
        Arc::new(EnqueueHandler::new(self.queue.clone()))
    }

    /// Run the informer and workers until shutdown.
    ///
    /// No key is processed before the informer cache has synced. On
    /// shutdown the queue stops accepting keys, workers finish what is
    /// already queued, and the call returns once all of them exit.
    pub async fn run(self: Arc<Self>, informer: Arc<Informer>, mut shutdown: Shutdown) {
        informer.add_event_handler(self.event_handler());

        let informer_task = tokio::spawn({
            let informer = informer.clone();
            let shutdown = shutdown.clone();
            async move { informer.run(shutdown).await }
        });

        info!("Waiting for informer cache to sync");
        if !wait_for_cache_sync(&mut shutdown, &[informer.as_ref()]).await {
            warn!("Shutdown before cache sync, no items processed");
            self.queue.shut_down();
            if let Err(e) = informer_task.await {
                error!(error = %e, "Informer task failed");
            }
            return;
        }

        info!(workers = self.config.workers, "Cache synced, starting workers");
        let workers: Vec<_> = (0..self.config.workers)
            .map(|id| {
                let controller = self.clone();
                tokio::spawn(async move { controller.run_worker(id).await })
            })
            .collect();

        shutdown.wait().await;
        info!(pending = self.queue.len(), "Shutting down workers");
        self.queue.shut_down();

        for joined in futures::future::join_all(workers).await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
            }
        }
        if let Err(e) = informer_task.await {
            error!(error = %e, "Informer task failed");
        }

        info!("Controller stopped");
    }

    async fn run_worker(&self, id: usize) {
        debug!(worker = id, "Worker started");
        while self.process_next_item().await {}
        debug!(worker = id, "Worker stopped");
    }

    /// Take one key off the queue and reconcile it.
    ///
    /// Returns `false` once the queue has shut down and drained.
    pub async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let result = self.reconciler.reconcile(&key).await;
        self.finish(key, result);
        true
    }

    /// Forget or requeue `key` according to `result`, then release it.
    fn finish(&self, key: String, result: Result<ReconcileOutcome>) {
        match result {
            Ok(outcome) => {
                self.queue.forget(&key);
                debug!(key = %key, outcome = %outcome, "Reconciled");
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    key = %key,
                    error = %e,
                    requeues = self.queue.num_requeues(&key),
                    "Reconcile failed, requeueing with backoff"
                );
                self.queue.add_rate_limited(key.clone());
            }
            Err(e) => {
                error!(key = %key, error = %e, "Dropping item");
                self.queue.forget(&key);
            }
        }
        self.queue.done(&key);
    }
}
