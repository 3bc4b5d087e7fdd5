//! Origin retrieval over HTTP and from the local filesystem.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheControl, ImageSrc, OriginResource, Validators};
use crate::domain::errors::{OptimizeError, OptimizeResult};
use crate::domain::ports::OriginFetcherPort;
use crate::infrastructure::config::ServiceConfig;

/// Fetches source images from allow-listed HTTP origins or local paths.
///
/// Remote fetches run behind a semaphore sized independently from the
/// transcode pool, so a burst of slow origins queues instead of
/// spawning unbounded network work.
pub struct HttpOriginFetcher {
    client: reqwest::Client,
    config: Arc<ServiceConfig>,
    semaphore: Semaphore,
    pending: AtomicUsize,
}

impl std::fmt::Debug for HttpOriginFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOriginFetcher")
            .field("timeout_secs", &self.config.fetch_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl HttpOriginFetcher {
    /// Creates a fetcher with the configured deadline.
    ///
    /// # Errors
    /// Returns `Unexpected` if the HTTP client cannot be built.
    pub fn new(config: Arc<ServiceConfig>) -> OptimizeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| OptimizeError::unexpected(format!("failed to create HTTP client: {e}")))?;
        let semaphore = Semaphore::new(config.max_concurrent_fetches.max(1));
        Ok(Self {
            client,
            config,
            semaphore,
            pending: AtomicUsize::new(0),
        })
    }

    /// Remote fetches queued or in flight right now.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    async fn fetch_remote(&self, url: &str, host: &str) -> OptimizeResult<OriginResource> {
        if !self.config.allows_domain(host) {
            warn!(host = %host, "Rejected src outside domain allow-list");
            return Err(OptimizeError::forbidden_domain(host));
        }

        self.pending.fetch_add(1, Ordering::Relaxed);
        let _gauge = PendingGuard(&self.pending);
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| OptimizeError::unexpected("fetch pool closed"))?;

        debug!(url = %url, "Fetching origin image");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                OptimizeError::OriginTimeout {
                    timeout_secs: self.config.fetch_timeout_secs,
                }
            } else {
                OptimizeError::origin_unavailable(format!("request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(OptimizeError::origin_unavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };

        let content_type = header(reqwest::header::CONTENT_TYPE);
        let validators = Validators {
            etag: header(reqwest::header::ETAG),
            last_modified: header(reqwest::header::LAST_MODIFIED),
        };
        let cache_control = header(reqwest::header::CACHE_CONTROL)
            .map(|v| CacheControl::parse(&v))
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                OptimizeError::OriginTimeout {
                    timeout_secs: self.config.fetch_timeout_secs,
                }
            } else {
                OptimizeError::origin_unavailable(format!("failed to read body: {e}"))
            }
        })?;

        let content_type =
            content_type.unwrap_or_else(|| sniff_content_type(&bytes, url).to_string());

        trace!(url = %url, size = bytes.len(), content_type = %content_type, "Origin fetch complete");

        Ok(OriginResource {
            bytes,
            content_type,
            validators,
            cache_control,
        })
    }

    async fn fetch_local(&self, path: &std::path::Path) -> OptimizeResult<OriginResource> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| OptimizeError::origin_unavailable(format!("read failed: {e}")))?;

        // File mtime stands in for Last-Modified, as an opaque validator.
        let last_modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs().to_string());

        let content_type = sniff_content_type(&bytes, &path.to_string_lossy()).to_string();

        trace!(path = %path.display(), size = bytes.len(), "Local origin read");

        Ok(OriginResource {
            bytes: Bytes::from(bytes),
            content_type,
            validators: Validators {
                etag: None,
                last_modified,
            },
            cache_control: CacheControl::default(),
        })
    }
}

/// Decrements the pending gauge even when a fetch errors out early.
struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl OriginFetcherPort for HttpOriginFetcher {
    async fn fetch(&self, src: &ImageSrc) -> OptimizeResult<OriginResource> {
        match src {
            ImageSrc::Local(path) => self.fetch_local(path).await,
            ImageSrc::Remote { url, host } => self.fetch_remote(url, host).await,
        }
    }
}

/// Detects an image content type from magic bytes, falling back to the
/// source name's extension.
#[must_use]
pub fn sniff_content_type(bytes: &[u8], name: &str) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }
    if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        return "image/svg+xml";
    }

    let lower = name.to_ascii_lowercase();
    let stem = lower.split('?').next().unwrap_or(&lower);
    if stem.ends_with(".jpg") || stem.ends_with(".jpeg") {
        "image/jpeg"
    } else if stem.ends_with(".png") {
        "image/png"
    } else if stem.ends_with(".gif") {
        "image/gif"
    } else if stem.ends_with(".webp") {
        "image/webp"
    } else if stem.ends_with(".svg") {
        "image/svg+xml"
    } else if stem.ends_with(".ico") {
        "image/x-icon"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    fn fetcher_with_domains(domains: &[&str]) -> HttpOriginFetcher {
        let config = ServiceConfig {
            domains: domains.iter().map(ToString::to_string).collect(),
            ..ServiceConfig::default()
        };
        HttpOriginFetcher::new(Arc::new(config)).unwrap()
    }

    #[tokio::test]
    async fn test_unlisted_domain_rejected_without_io() {
        let fetcher = fetcher_with_domains(&["cdn.example.com"]);
        let src = ImageSrc::parse("https://evil.example.com/a.jpg").unwrap();

        let result = fetcher.fetch(&src).await;
        assert!(matches!(
            result,
            Err(OptimizeError::ForbiddenDomain { host }) if host == "evil.example.com"
        ));
        // Rejected before it ever entered the fetch pool.
        assert_eq!(fetcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_local_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
            .unwrap();
        drop(file);

        let fetcher = fetcher_with_domains(&[]);
        let src = ImageSrc::Local(path);
        let resource = fetcher.fetch(&src).await.unwrap();

        assert_eq!(resource.content_type, "image/png");
        assert!(resource.validators.last_modified.is_some());
        assert_eq!(resource.cache_control, CacheControl::default());
    }

    #[tokio::test]
    async fn test_missing_local_file_is_unavailable() {
        let fetcher = fetcher_with_domains(&[]);
        let src = ImageSrc::Local("/definitely/not/here.png".into());

        let result = fetcher.fetch(&src).await;
        assert!(matches!(result, Err(OptimizeError::OriginUnavailable { .. })));
    }

    #[test_case(&[0xFF, 0xD8, 0xFF, 0xE0], "x", "image/jpeg"; "jpeg magic")]
    #[test_case(&[0x89, b'P', b'N', b'G'], "x", "image/png"; "png magic")]
    #[test_case(b"GIF89a...", "x", "image/gif"; "gif magic")]
    #[test_case(b"", "photo.JPG", "image/jpeg"; "extension fallback")]
    #[test_case(b"", "photo.webp?v=2", "image/webp"; "extension before query")]
    #[test_case(b"", "unknown.bin", "application/octet-stream"; "unknown")]
    fn test_sniff(bytes: &[u8], name: &str, expected: &str) {
        assert_eq!(sniff_content_type(bytes, name), expected);
    }

    #[test]
    fn test_sniff_webp_riff() {
        let bytes = b"RIFF\x00\x00\x00\x00WEBPVP8 ";
        assert_eq!(sniff_content_type(bytes, "x"), "image/webp");
    }
}
