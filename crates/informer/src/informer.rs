//! List-then-watch loop feeding the cache and registered handlers.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use herald_core::{Comment, ResourceKey, Shutdown};
use herald_store::{CommentApi, WatchEvent};
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheMap, CommentLister};
use crate::handler::ResourceEventHandler;

/// Default interval between full re-deliveries of the cache.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(30);

/// Pause before relisting after a failed list or a closed watch.
const RELIST_BACKOFF: Duration = Duration::from_secs(1);

enum WatchExit {
    Shutdown,
    Relist,
}

/// Keeps a [`Cache`] in step with a [`CommentApi`].
pub struct Informer {
    api: Arc<dyn CommentApi>,
    cache: Arc<Cache>,
    handlers: RwLock<Vec<Arc<dyn ResourceEventHandler>>>,
    synced: watch::Sender<bool>,
    resync_period: Duration,
}

impl Informer {
    /// A zero `resync_period` disables resync.
    pub fn new(api: Arc<dyn CommentApi>, resync_period: Duration) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            api,
            cache: Arc::new(Cache::new()),
            handlers: RwLock::new(Vec::new()),
            synced,
            resync_period,
        }
    }

    pub fn lister(&self) -> Arc<dyn CommentLister> {
        self.cache.clone()
    }

    pub fn resync_period(&self) -> Duration {
        self.resync_period
    }

    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Register a handler.
    ///
    /// A handler added after the first sync is sent `on_add` for every
    /// object already cached.
    pub fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if self.has_synced() {
            for obj in self.cache.list() {
                handler.on_add(&obj);
            }
        }
        handlers.push(handler);
    }

    /// Resolves `true` once synced, or `false` if shutdown fires first.
    pub async fn wait_for_sync(&self, shutdown: &mut Shutdown) -> bool {
        let mut synced = self.synced.subscribe();
        tokio::select! {
            ok = async { synced.wait_for(|s| *s).await.is_ok() } => ok,
            () = shutdown.wait() => false,
        }
    }

    /// Run until shutdown.
    pub async fn run(&self, mut shutdown: Shutdown) {
        info!(resync_secs = self.resync_period.as_secs(), "Informer starting");

        loop {
            if shutdown.is_triggered() {
                break;
            }

            // Subscribe before listing so no event after the list is missed.
            let mut events = self.api.watch();
            let listed = match self.api.list().await {
                Ok(list) => list,
                Err(e) => {
                    warn!(error = %e, "List failed, retrying");
                    if Self::pause(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let list_version = listed.resource_version;
            self.replace(listed.items);
            if !self.synced.send_replace(true) {
                info!(objects = self.cache.len(), "Informer synced");
            }

            match self.watch(&mut events, list_version, &mut shutdown).await {
                WatchExit::Shutdown => break,
                WatchExit::Relist => {}
            }
        }

        info!("Informer stopped");
    }

    /// Returns `true` if shutdown fired during the pause.
    async fn pause(shutdown: &mut Shutdown) -> bool {
        tokio::select! {
            () = tokio::time::sleep(RELIST_BACKOFF) => false,
            () = shutdown.wait() => true,
        }
    }

    async fn watch(
        &self,
        events: &mut broadcast::Receiver<WatchEvent>,
        mut last_version: u64,
        shutdown: &mut Shutdown,
    ) -> WatchExit {
        let mut resync = self.resync_interval();

        loop {
            tokio::select! {
                () = shutdown.wait() => return WatchExit::Shutdown,
                received = events.recv() => match received {
                    Ok(event) => {
                        let version = event.resource_version();
                        // Already reflected in the list.
                        if version <= last_version {
                            continue;
                        }
                        last_version = version;
                        self.apply(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Watch lagged, relisting");
                        return WatchExit::Relist;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Watch closed, relisting");
                        if Self::pause(shutdown).await {
                            return WatchExit::Shutdown;
                        }
                        return WatchExit::Relist;
                    }
                },
                () = tick(&mut resync) => self.resync(),
            }
        }
    }

    fn resync_interval(&self) -> Option<Interval> {
        if self.resync_period.is_zero() {
            return None;
        }
        let Some(start) = Instant::now().checked_add(self.resync_period) else {
            warn!(period = ?self.resync_period, "Resync period out of range, resync disabled");
            return None;
        };
        let mut interval = tokio::time::interval_at(start, self.resync_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    }

    /// Install a fresh list, notifying handlers of the difference.
    fn replace(&self, items: Vec<Comment>) {
        let fresh: CacheMap = items
            .into_iter()
            .filter_map(|obj| match obj.key() {
                Ok(key) => Some((key, Arc::new(obj))),
                Err(e) => {
                    warn!(error = %e, "Skipping listed object with invalid key");
                    None
                }
            })
            .collect();

        let previous = self.cache.replace(fresh.clone());
        let handlers = self.handlers();

        for (key, new) in &fresh {
            match previous.get(key) {
                Some(old) => handlers.iter().for_each(|h| h.on_update(old, new)),
                None => handlers.iter().for_each(|h| h.on_add(new)),
            }
        }
        for (key, old) in &previous {
            if !fresh.contains_key(key) {
                handlers.iter().for_each(|h| h.on_delete(old));
            }
        }
    }

    fn apply(&self, event: WatchEvent) {
        let key = match event.object().key() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Skipping watch event with invalid key");
                return;
            }
        };
        let handlers = self.handlers();

        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                let new = Arc::new(obj);
                match self.cache.insert(key.clone(), new.clone()) {
                    Some(old) => handlers.iter().for_each(|h| h.on_update(&old, &new)),
                    None => handlers.iter().for_each(|h| h.on_add(&new)),
                }
                debug!(key = %key, version = new.resource_version(), "Cached");
            }
            WatchEvent::Deleted(obj) => {
                if self.cache.remove(&key).is_some() {
                    handlers.iter().for_each(|h| h.on_delete(&obj));
                    debug!(key = %key, "Evicted");
                }
            }
        }
    }

    fn resync(&self) {
        let snapshot = self.cache.snapshot();
        debug!(objects = snapshot.len(), "Resync");
        let handlers = self.handlers();
        for obj in snapshot.values() {
            handlers.iter().for_each(|h| h.on_update(obj, obj));
        }
    }

    fn handlers(&self) -> Vec<Arc<dyn ResourceEventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[cfg(test)]
    fn cached(&self, key: &ResourceKey) -> Option<Arc<Comment>> {
        self.cache.get(key)
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves `true` once every informer has synced, or `false` if shutdown
/// fires first.
pub async fn wait_for_cache_sync(shutdown: &mut Shutdown, informers: &[&Informer]) -> bool {
    for informer in informers {
        if !informer.wait_for_sync(shutdown).await {
            return false;
        }
    }
    true
}
