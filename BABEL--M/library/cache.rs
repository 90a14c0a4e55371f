//! Page cache shared by the discovery engine.
//!
//! Entries are keyed by the exact address string and are never evicted; the cache
//! lives as long as its engine. Byte totals are kept alongside the map so stats
//! never walk the entries.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::LibraryResult;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Whether lookups go through the cache at all.
    pub cache_enabled: bool,
    /// Number of cached pages.
    pub cached_pages: usize,
    /// Total bytes of cached content.
    pub cache_size_bytes: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to generate.
    pub misses: u64,
}

#[derive(Debug, Default)]
struct Entries {
    pages: IndexMap<String, Arc<str>>,
    bytes: usize,
}

/// Thread-safe, unbounded address to content map.
#[derive(Debug, Default)]
pub struct PageCache {
    entries: RwLock<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PageCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached content for `address`, if any. Does not touch the counters.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<Arc<str>> {
        self.entries.read().pages.get(address).cloned()
    }

    /// Returns the cached content or produces, stores, and returns it.
    ///
    /// When two callers race on the same address the first stored value wins.
    ///
    /// # Errors
    /// Propagates the error of `produce`; nothing is cached in that case.
    pub fn get_or_try_insert_with<F>(&self, address: &str, produce: F) -> LibraryResult<Arc<str>>
    where
        F: FnOnce() -> LibraryResult<String>,
    {
        if let Some(content) = self.get(address) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(content);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let produced: Arc<str> = Arc::from(produce()?);

        let mut entries = self.entries.write();
        if let Some(existing) = entries.pages.get(address) {
            return Ok(Arc::clone(existing));
        }
        entries.bytes += produced.len();
        entries
            .pages
            .insert(address.to_string(), Arc::clone(&produced));
        Ok(produced)
    }

    /// Number of cached pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().pages.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes of cached content.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.entries.read().bytes
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.pages.clear();
        entries.bytes = 0;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            cache_enabled: true,
            cached_pages: entries.pages.len(),
            cache_size_bytes: entries.bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = PageCache::new();
        let first = cache
            .get_or_try_insert_with("a", || Ok("content".to_string()))
            .unwrap();
        let second = cache
            .get_or_try_insert_with("a", || Ok("other".to_string()))
            .unwrap();
        assert_eq!(&*first, "content");
        assert_eq!(&*second, "content");

        let stats = cache.stats();
        assert_eq!(stats.cached_pages, 1);
        assert_eq!(stats.cache_size_bytes, 7);
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn keys_are_exact_strings() {
        let cache = PageCache::new();
        cache.get_or_try_insert_with("ff", || Ok("x".into())).unwrap();
        cache.get_or_try_insert_with("FF", || Ok("y".into())).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_bytes(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = PageCache::new();
        let err = cache
            .get_or_try_insert_with("zz", || Err(LibraryError::InvalidAddress("zz".into())))
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidAddress(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let cache = PageCache::new();
        cache.get_or_try_insert_with("1", || Ok("abc".into())).unwrap();
        cache.clear();
        assert_eq!(cache.stats(), CacheStats {
            cache_enabled: true,
            ..CacheStats::default()
        });
    }
}
