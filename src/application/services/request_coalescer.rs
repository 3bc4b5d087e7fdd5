//! Coalescing of concurrent identical builds.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::domain::entities::CacheKey;
use crate::domain::errors::{OptimizeError, OptimizeResult};

/// The product of one build cycle, broadcast to every waiter.
#[derive(Debug, Clone)]
pub struct BuiltVariant {
    /// The bytes to serve.
    pub bytes: Bytes,
    /// Content type of the served bytes.
    pub content_type: String,
    /// TTL in seconds, mirrored into the `Cache-Control` response header.
    pub max_age: u64,
}

/// Result of one coalesced build; Clone so failures broadcast too.
pub type BuildResult = OptimizeResult<BuiltVariant>;

type InFlightMap = HashMap<CacheKey, watch::Receiver<Option<BuildResult>>>;

/// Ensures at most one concurrent build per cache key.
///
/// The first caller for a key becomes the leader and spawns the build
/// as a detached task, so a disconnecting client never cancels work
/// other waiters depend on. Everyone (leader included) awaits the same
/// watch channel. The entry is removed when the build completes, so a
/// later request starts a fresh cycle.
#[derive(Debug, Default)]
pub struct RequestCoalescer {
    in_flight: Arc<Mutex<InFlightMap>>,
}

impl RequestCoalescer {
    /// Creates an empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of builds currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Runs `build` for `key`, or joins the build already in flight.
    ///
    /// Exactly one `build` invocation happens per key per cycle
    /// regardless of caller concurrency; its result (success or
    /// failure) is delivered to every waiter.
    ///
    /// # Errors
    /// Whatever error the single build produced, identically for every
    /// waiter.
    pub async fn run<F>(&self, key: &CacheKey, build: F) -> BuildResult
    where
        F: FnOnce() -> BoxFuture<'static, BuildResult>,
    {
        let mut rx = {
            let mut map = self.in_flight.lock();
            if let Some(rx) = map.get(key) {
                trace!(key = %key, "Joining in-flight build");
                rx.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                map.insert(key.clone(), rx.clone());
                drop(map);

                debug!(key = %key, "Starting build");
                let future = build();
                let in_flight = Arc::clone(&self.in_flight);
                let key = key.clone();
                tokio::spawn(async move {
                    let result = future.await;
                    in_flight.lock().remove(&key);
                    // Send after removal so a request arriving now
                    // starts a fresh cycle instead of joining a
                    // finished one.
                    let _ = tx.send(Some(result));
                });
                rx
            }
        };

        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // Sender dropped; only happens if the build task was
                // torn down before publishing.
                return rx
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| Err(OptimizeError::unexpected("build task aborted")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::FutureExt;

    use crate::domain::entities::{OutputFormat, ResolvedParams, TargetFormat};

    fn key(src: &str) -> CacheKey {
        let params = ResolvedParams {
            bucket_width: 640,
            output_format: OutputFormat::Target(TargetFormat::Webp),
            quality: 75,
        };
        CacheKey::derive(src, None, &params)
    }

    fn variant(tag: &str) -> BuiltVariant {
        BuiltVariant {
            bytes: Bytes::from(tag.as_bytes().to_vec()),
            content_type: "image/webp".to_string(),
            max_age: 60,
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_build() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let key = key("/a.jpg");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coalescer = Arc::clone(&coalescer);
            let builds = Arc::clone(&builds);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run(&key, move || {
                        async move {
                            builds.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(variant("shared"))
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.bytes.as_ref(), b"shared");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_build_independently() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let builds = Arc::new(AtomicUsize::new(0));

        for src in ["/a.jpg", "/b.jpg"] {
            let builds = Arc::clone(&builds);
            coalescer
                .run(&key(src), move || {
                    async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        Ok(variant(src))
                    }
                    .boxed()
                })
                .await
                .unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_completed_build_is_not_rejoined() {
        let coalescer = RequestCoalescer::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let key = key("/a.jpg");

        for _ in 0..2 {
            let builds = Arc::clone(&builds);
            coalescer
                .run(&key, move || {
                    async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        Ok(variant("rebuilt"))
                    }
                    .boxed()
                })
                .await
                .unwrap();
        }
        // Sequential cycles rebuild; coalescing only spans one cycle.
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_broadcast_to_all_waiters() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let key = key("/a.jpg");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coalescer = Arc::clone(&coalescer);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run(&key, || {
                        async {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Err(OptimizeError::origin_unavailable("origin down"))
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(
                result,
                Err(OptimizeError::OriginUnavailable { .. })
            ));
        }
        // A failed cycle is discarded, not retried automatically.
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_build_survives_waiter_cancellation() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let built = Arc::new(AtomicUsize::new(0));
        let key = key("/a.jpg");

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            let built = Arc::clone(&built);
            let key = key.clone();
            tokio::spawn(async move {
                coalescer
                    .run(&key, move || {
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            built.fetch_add(1, Ordering::SeqCst);
                            Ok(variant("detached"))
                        }
                        .boxed()
                    })
                    .await
            })
        };

        // Simulate the originating client disconnecting mid-build.
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
