//! Response caches keyed by URL.
//!
//! - [`MemoryCache`]: in-memory cache with an optional byte budget
//! - [`NoCache`]: passthrough implementation that caches nothing

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, PoisonError, RwLock},
};

use crate::request::{Payload, ResponseKind};

/// A cache of fetched responses.
///
/// Entries are keyed by URL and response kind, so a document and a binary
/// fetch of the same URL never alias.
pub trait ResponseCache: Send + Sync + 'static {
    /// Look up a cached response.
    fn get(&self, url: &str, kind: ResponseKind) -> Option<Payload>;

    /// Store a response.
    fn put(&self, url: &str, kind: ResponseKind, payload: Payload);

    /// Drop every cached response.
    fn clear(&self);
}

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _url: &str, _kind: ResponseKind) -> Option<Payload> {
        None
    }

    fn put(&self, _url: &str, _kind: ResponseKind, _payload: Payload) {}

    fn clear(&self) {}
}

type CacheKey = (String, ResponseKind);

/// An in-memory response cache.
///
/// When a byte budget is set, the oldest entries are evicted first once the
/// budget would be exceeded. Payloads larger than the whole budget are not
/// stored.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<MemoryCacheInner>>,
    max_bytes: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
    entries: HashMap<CacheKey, Payload>,
    /// Insertion order, oldest first.
    order: VecDeque<CacheKey>,
    bytes: usize,
}

impl MemoryCache {
    /// Create a cache with no size limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryCacheInner::default())),
            max_bytes: None,
        }
    }

    /// Create a cache holding at most `max_bytes` of payload.
    #[must_use]
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryCacheInner::default())),
            max_bytes: Some(max_bytes),
        }
    }

    /// Total payload bytes currently cached.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bytes
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, url: &str, kind: ResponseKind) -> Option<Payload> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(&(url.to_string(), kind)).cloned()
    }

    fn put(&self, url: &str, kind: ResponseKind, payload: Payload) {
        let size = payload.len();
        if self.max_bytes.is_some_and(|max| size > max) {
            tracing::debug!(url, size, "response larger than cache budget, not cached");
            return;
        }

        let key = (url.to_string(), kind);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(old) = inner.entries.remove(&key) {
            inner.bytes -= old.len();
            inner.order.retain(|k| k != &key);
        }

        if let Some(max) = self.max_bytes {
            while inner.bytes + size > max {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if let Some(evicted) = inner.entries.remove(&oldest) {
                    inner.bytes -= evicted.len();
                }
            }
        }

        inner.bytes += size;
        inner.order.push_back(key.clone());
        inner.entries.insert(key, payload);
    }

    fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entries.clear();
        inner.order.clear();
        inner.bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(bytes: &[u8]) -> Payload {
        Payload::Binary(bytes.to_vec())
    }

    #[test]
    fn test_no_cache() {
        let cache = NoCache;
        cache.put("http://a", ResponseKind::Binary, bin(&[1, 2, 3]));
        assert!(cache.get("http://a", ResponseKind::Binary).is_none());
    }

    #[test]
    fn test_memory_cache_kinds_do_not_alias() {
        let cache = MemoryCache::new();
        cache.put("http://a", ResponseKind::Binary, bin(&[1, 2, 3]));

        assert_eq!(cache.get("http://a", ResponseKind::Binary), Some(bin(&[1, 2, 3])));
        assert!(cache.get("http://a", ResponseKind::Document).is_none());
        assert_eq!(cache.bytes(), 3);
    }

    #[test]
    fn test_memory_cache_evicts_oldest() {
        let cache = MemoryCache::with_max_bytes(10);
        cache.put("http://a", ResponseKind::Binary, bin(&[0; 5]));
        cache.put("http://b", ResponseKind::Binary, bin(&[0; 5]));
        assert_eq!(cache.bytes(), 10);

        cache.put("http://c", ResponseKind::Binary, bin(&[0; 3]));
        assert_eq!(cache.bytes(), 8);
        assert!(cache.get("http://a", ResponseKind::Binary).is_none());
        assert!(cache.get("http://b", ResponseKind::Binary).is_some());
        assert!(cache.get("http://c", ResponseKind::Binary).is_some());
    }

    #[test]
    fn test_memory_cache_replaces_entry() {
        let cache = MemoryCache::new();
        cache.put("http://a", ResponseKind::Binary, bin(&[1, 2, 3]));
        cache.put("http://a", ResponseKind::Binary, bin(&[1, 2, 3, 4, 5]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes(), 5);
    }

    #[test]
    fn test_memory_cache_skips_oversized() {
        let cache = MemoryCache::with_max_bytes(4);
        cache.put("http://a", ResponseKind::Binary, bin(&[0; 2]));
        cache.put("http://big", ResponseKind::Binary, bin(&[0; 8]));

        assert!(cache.get("http://big", ResponseKind::Binary).is_none());
        assert!(cache.get("http://a", ResponseKind::Binary).is_some());
    }

    #[test]
    fn test_memory_cache_clear() {
        let cache = MemoryCache::new();
        cache.put("http://a", ResponseKind::Document, Payload::Document("{}".into()));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.bytes(), 0);
    }
}
