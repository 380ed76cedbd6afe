//! Manifest directory apply and watch behaviour.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use herald_core::{ResourceKey, shutdown};
use herald_store::{CommentApi, InMemoryCommentApi, ManifestLoader};

fn write(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), body).unwrap();
}

fn key(name: &str) -> ResourceKey {
    ResourceKey::new("default", name).unwrap()
}

fn setup() -> (tempfile::TempDir, Arc<InMemoryCommentApi>, ManifestLoader) {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(InMemoryCommentApi::new());
    let loader = ManifestLoader::new(dir.path(), api.clone());
    (dir, api, loader)
}

#[tokio::test]
async fn apply_creates_updates_and_deletes() {
    let (dir, api, loader) = setup();
    write(
        dir.path(),
        "comments.yaml",
        "metadata: {namespace: default, name: a}\nspec: {message: one}\n---\n\
         metadata: {namespace: default, name: b}\nspec: {message: two}\n",
    );

    let summary = loader.apply().await.unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(api.len().await, 2);

    write(
        dir.path(),
        "comments.yaml",
        "metadata: {namespace: default, name: a}\nspec: {message: edited}\n",
    );
    let summary = loader.apply().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);

    assert_eq!(api.get(&key("a")).await.unwrap().spec.message, "edited");
    assert!(api.get(&key("b")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn foreign_kind_fails_the_whole_pass() {
    let (dir, api, loader) = setup();
    write(
        dir.path(),
        "a.yaml",
        "metadata: {namespace: default, name: a}\nspec: {message: one}\n",
    );
    write(
        dir.path(),
        "b.yaml",
        "kind: ConfigMap\nmetadata: {namespace: default, name: b}\nspec: {message: two}\n",
    );

    assert!(loader.apply().await.is_err());
    assert!(api.is_empty().await);
}

#[tokio::test]
async fn spec_update_keeps_delivered_status() {
    let (dir, api, loader) = setup();
    write(
        dir.path(),
        "c1.yml",
        "metadata: {namespace: default, name: c1}\nspec: {message: hi}\n",
    );
    loader.apply().await.unwrap();

    let stored = api.get(&key("c1")).await.unwrap();
    api.update(stored.delivered()).await.unwrap();

    write(
        dir.path(),
        "c1.yml",
        "metadata: {namespace: default, name: c1}\nspec: {message: changed}\n",
    );
    loader.apply().await.unwrap();

    let after = api.get(&key("c1")).await.unwrap();
    assert_eq!(after.spec.message, "changed");
    assert!(after.is_created());
}

#[tokio::test]
async fn broken_manifest_leaves_store_untouched() {
    let (dir, api, loader) = setup();
    write(
        dir.path(),
        "a.yaml",
        "metadata: {namespace: default, name: a}\nspec: {message: one}\n",
    );
    loader.apply().await.unwrap();

    write(dir.path(), "b.yaml", "spec: [unterminated");
    assert!(loader.apply().await.is_err());
    assert_eq!(api.len().await, 1);
}

#[tokio::test]
async fn non_manifest_files_are_ignored() {
    let (dir, api, loader) = setup();
    write(dir.path(), "README.md", "# notes");
    write(dir.path(), "state.json", "{}");

    let summary = loader.apply().await.unwrap();
    assert!(!summary.changed());
    assert!(api.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_reapplies_on_change() {
    let (dir, api, loader) = setup();
    loader.apply().await.unwrap();

    let (trigger, signal) = shutdown::channel();
    let handle = Arc::new(loader)
        .spawn_watch(Duration::from_millis(50), signal)
        .unwrap();

    write(
        dir.path(),
        "late.yaml",
        "metadata: {namespace: default, name: late}\nspec: {message: hello}\n",
    );

    let mut found = false;
    for _ in 0..100 {
        if api.get(&key("late")).await.is_ok() {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(found, "watcher did not apply the new manifest");

    trigger.trigger();
    handle.await.unwrap();
}
