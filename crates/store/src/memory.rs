//! In-memory store with optional JSON persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use herald_core::{Comment, ResourceKey};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::api::{CommentApi, CommentList, WatchEvent};
use crate::error::{Error, Result};

/// Buffered watch events per subscriber before it is considered lagged.
const WATCH_CAPACITY: usize = 256;

struct Inner {
    objects: BTreeMap<ResourceKey, Comment>,
    /// Last assigned resource version.
    version: u64,
}

impl Inner {
    const fn next_version(&self) -> u64 {
        self.version.saturating_add(1)
    }

    fn snapshot(&self) -> CommentList {
        CommentList {
            resource_version: self.version,
            items: self.objects.values().cloned().collect(),
        }
    }
}

/// A [`CommentApi`] backed by a map.
///
/// Mutations are serialized by one lock; watch events are published in
/// resource-version order while that lock is held.
pub struct InMemoryCommentApi {
    inner: Mutex<Inner>,
    events: broadcast::Sender<WatchEvent>,
    state_file: Option<PathBuf>,
}

impl Default for InMemoryCommentApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCommentApi {
    /// Create an empty, non-persistent store.
    pub fn new() -> Self {
        Self::from_list(CommentList::default(), None)
    }

    fn from_list(list: CommentList, state_file: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        let version = list
            .items
            .iter()
            .map(Comment::resource_version)
            .fold(list.resource_version, u64::max);
        let objects = list
            .items
            .into_iter()
            .filter_map(|comment| comment.key().ok().map(|key| (key, comment)))
            .collect();

        Self {
            inner: Mutex::new(Inner { objects, version }),
            events,
            state_file,
        }
    }

    /// Open a store persisted at `path`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn with_state_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let list = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<CommentList>(&text)
                .map_err(|e| Error::parse_failed(&path, e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CommentList::default(),
            Err(e) => return Err(Error::read_failed(&path, e.to_string())),
        };

        info!(
            path = %path.display(),
            objects = list.items.len(),
            resource_version = list.resource_version,
            "Loaded comment store"
        );
        Ok(Self::from_list(list, Some(path)))
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Persist `objects` at `version`, then install them and publish `event`.
    ///
    /// Nothing changes if persisting fails.
    async fn commit(
        &self,
        inner: &mut Inner,
        objects: BTreeMap<ResourceKey, Comment>,
        version: u64,
        event: WatchEvent,
    ) -> Result<()> {
        if let Some(path) = &self.state_file {
            let list = CommentList {
                resource_version: version,
                items: objects.values().cloned().collect(),
            };
            persist(path, &list).await?;
        }

        inner.objects = objects;
        inner.version = version;

        let meta = &event.object().metadata;
        debug!(
            namespace = %meta.namespace,
            name = %meta.name,
            resource_version = version,
            "Publishing watch event"
        );
        // No subscribers is not an error.
        let _ = self.events.send(event);
        Ok(())
    }
}

/// Write `list` to `path` via a temp file and rename.
async fn persist(path: &Path, list: &CommentList) -> Result<()> {
    let json =
        serde_json::to_vec_pretty(list).map_err(|e| Error::write_failed(path, e.to_string()))?;
    let tmp = path.with_extension("json.tmp");

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| Error::write_failed(&tmp, e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::write_failed(path, e.to_string()))
}

#[async_trait]
impl CommentApi for InMemoryCommentApi {
    async fn get(&self, key: &ResourceKey) -> Result<Comment> {
        self.inner
            .lock()
            .await
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key.to_string()))
    }

    async fn list(&self) -> Result<CommentList> {
        Ok(self.inner.lock().await.snapshot())
    }

    async fn create(&self, mut comment: Comment) -> Result<Comment> {
        let key = comment.key()?;
        let mut inner = self.inner.lock().await;
        if inner.objects.contains_key(&key) {
            return Err(Error::already_exists(key.to_string()));
        }

        let version = inner.next_version();
        comment.metadata.resource_version = version;
        comment.metadata.creation_timestamp = Some(Utc::now());

        let mut objects = inner.objects.clone();
        objects.insert(key, comment.clone());
        self.commit(&mut inner, objects, version, WatchEvent::Added(comment.clone()))
            .await?;
        Ok(comment)
    }

    async fn update(&self, mut comment: Comment) -> Result<Comment> {
        let key = comment.key()?;
        let mut inner = self.inner.lock().await;
        let Some(stored) = inner.objects.get(&key) else {
            return Err(Error::not_found(key.to_string()));
        };

        let expected = comment.metadata.resource_version;
        let actual = stored.metadata.resource_version;
        if expected != 0 && expected != actual {
            return Err(Error::conflict(key.to_string(), expected, actual));
        }

        let version = inner.next_version();
        comment.metadata.creation_timestamp = stored.metadata.creation_timestamp;
        comment.metadata.resource_version = version;

        let mut objects = inner.objects.clone();
        objects.insert(key, comment.clone());
        self.commit(&mut inner, objects, version, WatchEvent::Modified(comment.clone()))
            .await?;
        Ok(comment)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<Comment> {
        let mut inner = self.inner.lock().await;
        let mut objects = inner.objects.clone();
        let Some(mut removed) = objects.remove(key) else {
            return Err(Error::not_found(key.to_string()));
        };

        let version = inner.next_version();
        removed.metadata.resource_version = version;

        self.commit(&mut inner, objects, version, WatchEvent::Deleted(removed.clone()))
            .await?;
        Ok(removed)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
