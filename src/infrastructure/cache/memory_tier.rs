//! In-memory LRU hot tier in front of the disk store.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::{CacheEntry, CacheKey};

/// Default maximum number of variants kept in memory.
pub const DEFAULT_CAPACITY: usize = 64;

/// LRU cache of recently served variants.
/// Thread-safe; only ever holds entries that were fresh when inserted,
/// and re-checks expiry on every read.
#[derive(Debug)]
pub struct MemoryVariantCache {
    cache: RwLock<LruCache<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryVariantCache {
    /// Creates a cache with the specified capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the entry for `key` if present and still fresh at `now`.
    /// Expired entries are dropped so the disk store's verdict wins.
    pub async fn get(&self, key: &CacheKey, now: SystemTime) -> Option<CacheEntry> {
        let mut cache = self.cache.write().await;
        match cache.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Memory tier hit");
                Some(entry.clone())
            }
            Some(_) => {
                cache.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Memory tier entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores a freshly written entry.
    pub async fn put(&self, entry: CacheEntry) {
        let mut cache = self.cache.write().await;
        trace!(key = %entry.key, "Storing variant in memory tier");
        cache.put(entry.key.clone(), entry);
    }

    /// Drops the entry for `key`, if present.
    pub async fn evict(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        if cache.pop(key).is_some() {
            debug!(key = %key, "Evicted variant from memory tier");
        }
    }

    /// Hit and miss counters since startup.
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for MemoryVariantCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;

    use crate::domain::entities::{OutputFormat, ResolvedParams, TargetFormat};

    fn entry(src: &str, ttl_secs: u64, now: SystemTime) -> CacheEntry {
        let params = ResolvedParams {
            bucket_width: 640,
            output_format: OutputFormat::Target(TargetFormat::Webp),
            quality: 75,
        };
        CacheEntry {
            key: CacheKey::derive(src, None, &params),
            bytes: Bytes::from_static(b"variant"),
            content_type: "image/webp".to_string(),
            created_at: now,
            expires_at: now + Duration::from_secs(ttl_secs),
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = MemoryVariantCache::new(4);
        let now = SystemTime::now();
        let entry = entry("/a.jpg", 60, now);
        let key = entry.key.clone();

        cache.put(entry).await;
        assert!(cache.get(&key, now).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_dropped_on_read() {
        let cache = MemoryVariantCache::new(4);
        let now = SystemTime::now();
        let entry = entry("/a.jpg", 10, now);
        let key = entry.key.clone();

        cache.put(entry).await;

        let later = now + Duration::from_secs(11);
        assert!(cache.get(&key, later).await.is_none());
        // Gone for good, not just filtered.
        assert!(cache.get(&key, now).await.is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryVariantCache::new(2);
        let now = SystemTime::now();

        let first = entry("/1.jpg", 60, now);
        let first_key = first.key.clone();
        cache.put(first).await;
        cache.put(entry("/2.jpg", 60, now)).await;
        cache.put(entry("/3.jpg", 60, now)).await;

        assert!(cache.get(&first_key, now).await.is_none());
    }

    #[tokio::test]
    async fn test_evict() {
        let cache = MemoryVariantCache::new(4);
        let now = SystemTime::now();
        let entry = entry("/a.jpg", 60, now);
        let key = entry.key.clone();

        cache.put(entry).await;
        cache.evict(&key).await;
        assert!(cache.get(&key, now).await.is_none());
    }
}
