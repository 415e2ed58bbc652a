// src/cache.rs - Bounded query -> page-0 snapshot cache with FIFO eviction

use lru::LruCache;
use std::num::NonZeroUsize;

/// Bounded cache mapping a normalized query string to its page-0 result
/// snapshot.
///
/// Eviction is FIFO by insertion order: lookups go through [`LruCache::peek`],
/// which never promotes an entry, so the underlying LRU order stays equal to
/// insertion order and `put` always evicts the oldest-inserted entry once the
/// cache is full.
///
/// Snapshots are cloned on both store and hit. The cache never hands out a
/// reference that pagination could later append to.
#[derive(Debug)]
pub(crate) struct ResultCache<T> {
    entries: LruCache<String, Vec<T>>,
}

impl<T: Clone> ResultCache<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity.max(1)).expect("capacity is nonzero")),
        }
    }

    /// Look up a snapshot without touching eviction order.
    pub(crate) fn get(&self, key: &str) -> Option<Vec<T>> {
        self.entries.peek(key).cloned()
    }

    /// Insert a snapshot, evicting the oldest entry if the cache is full.
    pub(crate) fn put(&mut self, key: String, snapshot: &[T]) {
        if self.entries.len() == self.entries.cap().get() && !self.entries.contains(&key) {
            log::trace!("result cache full, evicting oldest entry");
        }
        self.entries.put(key, snapshot.to_vec());
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
