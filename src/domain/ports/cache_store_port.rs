//! Port definition for the variant cache store.

use std::time::Duration;

use bytes::Bytes;

use crate::domain::entities::{CacheEntry, CacheKey, Validators};
use crate::domain::errors::OptimizeResult;

/// Outcome of a cache lookup.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// A fresh entry exists.
    Fresh(CacheEntry),
    /// An entry exists but its TTL has elapsed; the caller evicts it
    /// before rebuilding.
    Expired(CacheEntry),
    /// No entry exists.
    Miss,
}

/// Port for persisting transcoded variants.
/// Implementations must be thread-safe and write atomically, so a
/// concurrent reader never observes partial content.
#[async_trait::async_trait]
pub trait CacheStorePort: Send + Sync {
    /// Looks up the entry for `key`, classifying its freshness.
    async fn lookup(&self, key: &CacheKey) -> CacheLookup;

    /// Writes a new entry expiring `ttl` from now, atomically replacing
    /// any prior entry for the same key.
    ///
    /// # Errors
    /// Returns `CacheIo` on disk failure; callers recover by serving
    /// the built bytes uncached.
    async fn put(
        &self,
        key: &CacheKey,
        bytes: Bytes,
        content_type: &str,
        ttl: Duration,
        validators: &Validators,
    ) -> OptimizeResult<CacheEntry>;

    /// Deletes the entry for `key`; idempotent when already absent.
    async fn evict(&self, key: &CacheKey);
}
