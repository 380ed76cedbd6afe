//! Declarative manifests: a directory of YAML files as the source of truth.
//!
//! Each `*.yaml` / `*.yml` file may hold several `---`-separated `Comment`
//! documents. Applying the directory creates unknown objects, updates the
//! spec of changed ones (status is kept), and deletes objects that no
//! longer appear in any file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use herald_core::{Comment, ResourceKey, ResultExt, Shutdown};
use itertools::Itertools;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::CommentApi;
use crate::error::{Error, Result};

/// Counts of changes made by one [`ManifestLoader::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl ApplySummary {
    pub const fn changed(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0
    }
}

/// Applies a manifest directory to a [`CommentApi`].
pub struct ManifestLoader {
    dir: PathBuf,
    api: Arc<dyn CommentApi>,
}

impl ManifestLoader {
    pub fn new(dir: impl Into<PathBuf>, api: Arc<dyn CommentApi>) -> Self {
        Self {
            dir: dir.into(),
            api,
        }
    }

    /// Parse every manifest in the directory, keyed by resource key.
    ///
    /// Later files (in path order) win over earlier ones on duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any manifest cannot be read or
    /// parsed; a partial read is never returned.
    pub async fn read_manifests(&self) -> Result<BTreeMap<ResourceKey, Comment>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::read_failed(&self.dir, e.to_string()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::read_failed(&self.dir, e.to_string()))?
        {
            let path = entry.path();
            if is_manifest(&path) {
                paths.push(path);
            }
        }

        let mut desired = BTreeMap::new();
        for path in paths.into_iter().sorted() {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::read_failed(&path, e.to_string()))?;

            for comment in parse_documents(&path, &text)? {
                let key = comment.validate()?;
                if desired.insert(key.clone(), comment).is_some() {
                    warn!(key = %key, path = %path.display(), "Duplicate manifest, later file wins");
                }
            }
        }

        Ok(desired)
    }

    /// Converge the store to the manifest directory.
    ///
    /// # Errors
    ///
    /// Returns the first read, parse, or store error. The store is left
    /// untouched if the manifests cannot be read.
    pub async fn apply(&self) -> Result<ApplySummary> {
        let desired = self.read_manifests().await?;
        let current: BTreeMap<ResourceKey, Comment> = self
            .api
            .list()
            .await?
            .items
            .into_iter()
            .filter_map(|comment| comment.key().into_option_logged().map(|key| (key, comment)))
            .collect();

        let mut summary = ApplySummary::default();

        for (key, manifest) in &desired {
            match current.get(key) {
                None => {
                    let mut fresh = manifest.clone();
                    fresh.metadata.resource_version = 0;
                    self.api.create(fresh).await?;
                    debug!(key = %key, "Created from manifest");
                    summary.created = summary.created.saturating_add(1);
                }
                Some(existing) if existing.spec != manifest.spec => {
                    let mut next = existing.clone();
                    next.spec = manifest.spec.clone();
                    self.api.update(next).await?;
                    debug!(key = %key, "Updated spec from manifest");
                    summary.updated = summary.updated.saturating_add(1);
                }
                Some(_) => summary.unchanged = summary.unchanged.saturating_add(1),
            }
        }

        for key in current.keys().filter(|key| !desired.contains_key(key)) {
            self.api.delete(key).await?;
            debug!(key = %key, "Deleted, no longer in manifests");
            summary.deleted = summary.deleted.saturating_add(1);
        }

        if summary.changed() {
            info!(
                dir = %self.dir.display(),
                created = summary.created,
                updated = summary.updated,
                deleted = summary.deleted,
                "Applied manifests"
            );
        }
        Ok(summary)
    }

    /// Re-apply the directory after every debounced change until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the file watcher cannot be created.
    pub fn spawn_watch(
        self: Arc<Self>,
        debounce: Duration,
        mut shutdown: Shutdown,
    ) -> Result<JoinHandle<()>> {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
            Ok(events) if !events.is_empty() => {
                // A full channel already has a re-apply pending.
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = ?e, "Manifest watch error"),
        })
        .map_err(|e| Error::watch_failed(format!("failed to create file watcher: {e}")))?;

        debouncer
            .watcher()
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                Error::watch_failed(format!("failed to watch {}: {e}", self.dir.display()))
            })?;

        info!(dir = %self.dir.display(), "Watching manifests");

        Ok(tokio::spawn(async move {
            // Dropping the debouncer stops the watch.
            let _debouncer = debouncer;
            loop {
                tokio::select! {
                    changed = rx.recv() => {
                        if changed.is_none() {
                            break;
                        }
                        if let Err(e) = self.apply().await {
                            error!(dir = %self.dir.display(), error = %e, "Failed to apply manifests");
                        }
                    }
                    () = shutdown.wait() => break,
                }
            }
            debug!(dir = %self.dir.display(), "Manifest watch stopped");
        }))
    }
}

fn is_manifest(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Parse every non-empty YAML document in `text`.
fn parse_documents(path: &Path, text: &str) -> Result<Vec<Comment>> {
    let mut comments = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| Error::parse_failed(path, e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let comment: Comment =
            serde_yaml::from_value(value).map_err(|e| Error::parse_failed(path, e.to_string()))?;
        comments.push(comment);
    }
    Ok(comments)
}
