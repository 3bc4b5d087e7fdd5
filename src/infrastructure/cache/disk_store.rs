//! Disk-backed variant store with atomic writes.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheEntry, CacheKey, Validators};
use crate::domain::errors::{OptimizeError, OptimizeResult};
use crate::domain::ports::{CacheLookup, CacheStorePort};

use super::memory_tier::MemoryVariantCache;

/// Sidecar metadata persisted next to each artifact; enough to
/// reconstruct a `CacheEntry` without re-fetching the origin.
#[derive(Debug, Serialize, Deserialize)]
struct VariantMeta {
    content_type: String,
    created_at: u64,
    expires_at: u64,
    #[serde(default)]
    validators: Validators,
}

/// Variant store persisting one artifact per cache key under the cache
/// root, named by the key digest, with a JSON metadata sidecar.
///
/// Eviction is purely lazy: expired entries stay on disk until the next
/// lookup classifies them `Expired` and the caller evicts.
#[derive(Debug)]
pub struct DiskVariantStore {
    root: PathBuf,
    memory: MemoryVariantCache,
}

impl DiskVariantStore {
    /// Opens (creating if needed) a store rooted at `root`, with a
    /// memory hot tier of `memory_entries` variants.
    ///
    /// # Errors
    /// Returns `CacheIo` if the root directory cannot be created.
    pub async fn new(root: PathBuf, memory_entries: usize) -> OptimizeResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| OptimizeError::cache_io(format!("failed to create cache root: {e}")))?;
        debug!(root = %root.display(), "Opened variant store");
        Ok(Self {
            root,
            memory: MemoryVariantCache::new(memory_entries),
        })
    }

    fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{key}.img"))
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{key}.meta"))
    }

    /// Whether an artifact for `key` exists on disk, regardless of
    /// freshness.
    pub async fn contains_artifact(&self, key: &CacheKey) -> bool {
        fs::try_exists(&self.artifact_path(key)).await.unwrap_or(false)
    }

    /// Memory tier hit/miss counters.
    #[must_use]
    pub fn memory_stats(&self) -> (u64, u64) {
        self.memory.stats()
    }

    async fn read_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let meta_bytes = fs::read(self.meta_path(key)).await.ok()?;
        let meta: VariantMeta = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt cache metadata, discarding entry");
                self.remove_files(key).await;
                return None;
            }
        };
        let bytes = fs::read(self.artifact_path(key)).await.ok()?;

        Some(CacheEntry {
            key: key.clone(),
            bytes: Bytes::from(bytes),
            content_type: meta.content_type,
            created_at: UNIX_EPOCH + Duration::from_secs(meta.created_at),
            expires_at: UNIX_EPOCH + Duration::from_secs(meta.expires_at),
        })
    }

    async fn remove_files(&self, key: &CacheKey) {
        for path in [self.artifact_path(key), self.meta_path(key)] {
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove cache file");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl CacheStorePort for DiskVariantStore {
    async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let now = SystemTime::now();

        if let Some(entry) = self.memory.get(key, now).await {
            return CacheLookup::Fresh(entry);
        }

        match self.read_entry(key).await {
            Some(entry) if entry.is_fresh(now) => {
                trace!(key = %key, "Disk store fresh hit");
                self.memory.put(entry.clone()).await;
                CacheLookup::Fresh(entry)
            }
            Some(entry) => {
                trace!(key = %key, "Disk store entry expired");
                CacheLookup::Expired(entry)
            }
            None => {
                trace!(key = %key, "Disk store miss");
                CacheLookup::Miss
            }
        }
    }

    async fn put(
        &self,
        key: &CacheKey,
        bytes: Bytes,
        content_type: &str,
        ttl: Duration,
        validators: &Validators,
    ) -> OptimizeResult<CacheEntry> {
        let created_at = SystemTime::now();
        let expires_at = created_at + ttl;

        let meta = VariantMeta {
            content_type: content_type.to_string(),
            created_at: unix_secs(created_at),
            expires_at: unix_secs(expires_at),
            validators: validators.clone(),
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| OptimizeError::cache_io(format!("failed to encode metadata: {e}")))?;

        // Write-to-temp-then-rename, artifact before sidecar, so a
        // reader that sees the sidecar always sees complete bytes.
        let root = self.root.clone();
        let artifact_path = self.artifact_path(key);
        let meta_path = self.meta_path(key);
        let artifact_bytes = bytes.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            use std::io::Write;

            let mut artifact = tempfile::NamedTempFile::new_in(&root)?;
            artifact.write_all(&artifact_bytes)?;
            artifact.flush()?;
            artifact.persist(&artifact_path).map_err(|e| e.error)?;

            let mut sidecar = tempfile::NamedTempFile::new_in(&root)?;
            sidecar.write_all(&meta_json)?;
            sidecar.flush()?;
            sidecar.persist(&meta_path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| OptimizeError::cache_io(format!("cache write task panicked: {e}")))?
        .map_err(|e| OptimizeError::cache_io(format!("cache write failed: {e}")))?;

        let entry = CacheEntry {
            key: key.clone(),
            bytes,
            content_type: content_type.to_string(),
            created_at,
            expires_at,
        };
        self.memory.put(entry.clone()).await;

        debug!(
            key = %key,
            size = entry.bytes.len(),
            ttl_secs = ttl.as_secs(),
            "Stored variant"
        );
        Ok(entry)
    }

    async fn evict(&self, key: &CacheKey) {
        self.memory.evict(key).await;
        self.remove_files(key).await;
        debug!(key = %key, "Evicted variant");
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
