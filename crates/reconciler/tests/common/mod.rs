//! Test doubles shared by the controller tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use herald_core::{Comment, ResourceKey};
use herald_github::{CommentSender, Error as GithubError, IssueRef};
use herald_store::{CommentApi, CommentList, Error as StoreError, InMemoryCommentApi, WatchEvent};
use tokio::sync::{Notify, broadcast};
use tokio::time::Instant;

/// Records every send; fails the first `failures` calls.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, Instant)>>,
    failures: AtomicU32,
}

impl RecordingSender {
    pub fn failing(times: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: AtomicU32::new(times),
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(body, _)| body.clone())
            .collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.sent.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl CommentSender for RecordingSender {
    async fn send(&self, _target: &IssueRef, body: &str) -> herald_github::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((body.to_string(), Instant::now()));

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GithubError::api(502, "Bad Gateway"));
        }
        Ok(())
    }
}

/// Never answers.
pub struct HangingSender;

#[async_trait]
impl CommentSender for HangingSender {
    async fn send(&self, _target: &IssueRef, _body: &str) -> herald_github::Result<()> {
        std::future::pending().await
    }
}

/// In-memory store whose first `failures` updates fail.
pub struct FlakyApi {
    pub inner: InMemoryCommentApi,
    failures: AtomicU32,
    pub updates: AtomicU32,
}

impl FlakyApi {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryCommentApi::new(),
            failures: AtomicU32::new(failures),
            updates: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CommentApi for FlakyApi {
    async fn get(&self, key: &ResourceKey) -> herald_store::Result<Comment> {
        self.inner.get(key).await
    }

    async fn list(&self) -> herald_store::Result<CommentList> {
        self.inner.list().await
    }

    async fn create(&self, comment: Comment) -> herald_store::Result<Comment> {
        self.inner.create(comment).await
    }

    async fn update(&self, comment: Comment) -> herald_store::Result<Comment> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::write_failed("state.json", "disk full"));
        }
        self.inner.update(comment).await
    }

    async fn delete(&self, key: &ResourceKey) -> herald_store::Result<Comment> {
        self.inner.delete(key).await
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch()
    }
}

/// In-memory store whose `list` blocks until [`GatedApi::release`].
#[derive(Default)]
pub struct GatedApi {
    pub inner: InMemoryCommentApi,
    gate: Notify,
    open: AtomicBool,
}

impl GatedApi {
    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.gate.notify_one();
    }
}

#[async_trait]
impl CommentApi for GatedApi {
    async fn get(&self, key: &ResourceKey) -> herald_store::Result<Comment> {
        self.inner.get(key).await
    }

    async fn list(&self) -> herald_store::Result<CommentList> {
        if !self.open.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.inner.list().await
    }

    async fn create(&self, comment: Comment) -> herald_store::Result<Comment> {
        self.inner.create(comment).await
    }

    async fn update(&self, comment: Comment) -> herald_store::Result<Comment> {
        self.inner.update(comment).await
    }

    async fn delete(&self, key: &ResourceKey) -> herald_store::Result<Comment> {
        self.inner.delete(key).await
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch()
    }
}

pub fn target() -> IssueRef {
    "octo/repo#1".parse().unwrap()
}

pub fn key(name: &str) -> ResourceKey {
    ResourceKey::new("default", name).unwrap()
}
