//! Cached variant entries and serve diagnostics.

use std::time::{Duration, SystemTime};

use bytes::Bytes;

use super::cache_key::CacheKey;

/// One transcoded variant persisted by the cache store.
///
/// Owned exclusively by the store; written atomically so readers see
/// the full content or nothing.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The derived key this entry is stored under.
    pub key: CacheKey,
    /// The variant bytes.
    pub bytes: Bytes,
    /// Content type of the variant.
    pub content_type: String,
    /// When the entry was written.
    pub created_at: SystemTime,
    /// When the entry stops being fresh. Always `>= created_at`.
    pub expires_at: SystemTime,
}

impl CacheEntry {
    /// Whether the entry is still fresh at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }

    /// Seconds of freshness left at `now`, zero once expired.
    #[must_use]
    pub fn remaining_ttl(&self, now: SystemTime) -> Duration {
        self.expires_at
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }
}

/// Diagnostic cache disposition reported on each served response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh cache entry.
    Hit,
    /// Built because no entry existed.
    Miss,
    /// Rebuilt because the prior entry had expired.
    Stale,
}

impl CacheStatus {
    /// Header value for the diagnostic response header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Stale => "STALE",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{OutputFormat, ResolvedParams, TargetFormat};

    fn entry(ttl_secs: u64) -> CacheEntry {
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let params = ResolvedParams {
            bucket_width: 640,
            output_format: OutputFormat::Target(TargetFormat::Webp),
            quality: 75,
        };
        CacheEntry {
            key: CacheKey::derive("/a.jpg", None, &params),
            bytes: Bytes::from_static(b"variant"),
            content_type: "image/webp".to_string(),
            created_at: created,
            expires_at: created + Duration::from_secs(ttl_secs),
        }
    }

    #[test]
    fn test_freshness_boundary() {
        let entry = entry(30);
        let just_before = entry.expires_at - Duration::from_secs(1);
        assert!(entry.is_fresh(just_before));
        assert!(!entry.is_fresh(entry.expires_at));
    }

    #[test]
    fn test_remaining_ttl_saturates() {
        let entry = entry(30);
        assert_eq!(
            entry.remaining_ttl(entry.created_at),
            Duration::from_secs(30)
        );
        let long_after = entry.expires_at + Duration::from_secs(100);
        assert_eq!(entry.remaining_ttl(long_after), Duration::ZERO);
    }

    #[test]
    fn test_status_header_values() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
        assert_eq!(CacheStatus::Stale.as_str(), "STALE");
    }
}
