//! Point-in-time view of the store.

use std::sync::{Arc, PoisonError, RwLock};

use herald_core::{Comment, ResourceKey};

/// Map type held by the cache. Cloning is O(1).
pub type CacheMap = im::HashMap<ResourceKey, Arc<Comment>>;

/// Read access to cached objects.
pub trait CommentLister: Send + Sync {
    fn get(&self, key: &ResourceKey) -> Option<Arc<Comment>>;

    fn list(&self) -> Vec<Arc<Comment>>;
}

/// `namespace/name`-keyed cache of `Comment` objects.
#[derive(Debug, Default)]
pub struct Cache {
    items: RwLock<CacheMap>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheMap> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheMap> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace, returning the previous object.
    pub fn insert(&self, key: ResourceKey, comment: Arc<Comment>) -> Option<Arc<Comment>> {
        self.write().insert(key, comment)
    }

    pub fn remove(&self, key: &ResourceKey) -> Option<Arc<Comment>> {
        self.write().remove(key)
    }

    /// Swap in a whole new view, returning the old one.
    pub fn replace(&self, items: CacheMap) -> CacheMap {
        std::mem::replace(&mut *self.write(), items)
    }

    pub fn snapshot(&self) -> CacheMap {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl CommentLister for Cache {
    fn get(&self, key: &ResourceKey) -> Option<Arc<Comment>> {
        self.read().get(key).cloned()
    }

    fn list(&self) -> Vec<Arc<Comment>> {
        self.read().values().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(name: &str) -> (ResourceKey, Arc<Comment>) {
        let comment = Comment::new("default", name, "hi");
        (comment.key().unwrap(), Arc::new(comment))
    }

    #[test]
    fn test_insert_returns_previous() {
        let cache = Cache::new();
        let (key, first) = entry("c1");

        assert!(cache.insert(key.clone(), first.clone()).is_none());
        let replaced = cache.insert(key.clone(), Arc::new((*first).clone().delivered()));
        assert_eq!(replaced, Some(first));
        assert!(cache.get(&key).unwrap().is_created());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let cache = Cache::new();
        let (a, comment_a) = entry("a");
        cache.insert(a.clone(), comment_a);

        let snapshot = cache.snapshot();
        cache.remove(&a);

        assert!(snapshot.contains_key(&a));
        assert!(cache.is_empty());
    }
}
