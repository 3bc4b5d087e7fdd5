//! Origin source identity and fetched resources.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{OptimizeError, OptimizeResult};

/// Where the source bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSrc {
    /// A path on the local filesystem; exempt from the domain allow-list.
    Local(PathBuf),
    /// An absolute URL whose host must be allow-listed.
    Remote {
        /// The full absolute URL.
        url: String,
        /// The host component, checked against the allow-list.
        host: String,
    },
}

impl ImageSrc {
    /// Parses a `src` string into a local path or a remote URL.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for absolute URLs without a host or with
    /// a non-HTTP scheme.
    pub fn parse(src: &str) -> OptimizeResult<Self> {
        if src.starts_with("http://") || src.starts_with("https://") {
            let url = reqwest::Url::parse(src)
                .map_err(|e| OptimizeError::invalid_request(format!("invalid src URL: {e}")))?;
            let host = url
                .host_str()
                .ok_or_else(|| OptimizeError::invalid_request("src URL has no host"))?
                .to_string();
            Ok(Self::Remote {
                url: src.to_string(),
                host,
            })
        } else if src.starts_with("//") {
            Err(OptimizeError::invalid_request(
                "protocol-relative src is not supported",
            ))
        } else {
            Ok(Self::Local(PathBuf::from(src)))
        }
    }

    /// The canonical identity string folded into cache keys.
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Local(path) => path.to_string_lossy().into_owned(),
            Self::Remote { url, .. } => url.clone(),
        }
    }
}

/// Origin-supplied freshness validators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validators {
    /// `ETag` response header, verbatim.
    pub etag: Option<String>,
    /// `Last-Modified` response header, verbatim.
    pub last_modified: Option<String>,
}

impl Validators {
    /// The strongest available validator (`ETag` over `Last-Modified`).
    #[must_use]
    pub fn strongest(&self) -> Option<&str> {
        self.etag
            .as_deref()
            .or(self.last_modified.as_deref())
    }
}

/// Freshness directives parsed from the origin's `Cache-Control` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    /// `s-maxage` directive in seconds.
    pub s_maxage: Option<u64>,
    /// `max-age` directive in seconds.
    pub max_age: Option<u64>,
}

impl CacheControl {
    /// Parses the directives we care about; unknown or malformed
    /// directives are ignored.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut parsed = Self::default();
        for directive in header.split(',') {
            let directive = directive.trim();
            let Some((name, value)) = directive.split_once('=') else {
                continue;
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "s-maxage" => parsed.s_maxage = value.trim().parse().ok(),
                "max-age" => parsed.max_age = value.trim().parse().ok(),
                _ => {}
            }
        }
        parsed
    }

    /// Computes the variant TTL: `s-maxage`, else `max-age`, else the
    /// configured floor. The floor applies only when the origin sent
    /// neither directive.
    #[must_use]
    pub fn ttl(&self, minimum: Duration) -> Duration {
        self.s_maxage
            .or(self.max_age)
            .map_or(minimum, Duration::from_secs)
    }
}

/// A source image fetched from its origin.
///
/// Held only for the duration of one build; never cached in memory.
#[derive(Debug, Clone)]
pub struct OriginResource {
    /// The raw source bytes.
    pub bytes: Bytes,
    /// The origin's content type.
    pub content_type: String,
    /// Freshness validators, when the origin supplied them.
    pub validators: Validators,
    /// Parsed `Cache-Control` directives.
    pub cache_control: CacheControl,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_remote_src() {
        let src = ImageSrc::parse("https://cdn.example.com/a.jpg").unwrap();
        assert_eq!(
            src,
            ImageSrc::Remote {
                url: "https://cdn.example.com/a.jpg".to_string(),
                host: "cdn.example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_local_src() {
        let src = ImageSrc::parse("/images/a.png").unwrap();
        assert_eq!(src, ImageSrc::Local(PathBuf::from("/images/a.png")));
    }

    #[test]
    fn test_rejects_protocol_relative() {
        assert!(ImageSrc::parse("//cdn.example.com/a.jpg").is_err());
    }

    #[test_case("s-maxage=120, max-age=60", Some(120), Some(60); "both directives")]
    #[test_case("max-age=60", None, Some(60); "max age only")]
    #[test_case("public, max-age=30, must-revalidate", None, Some(30); "amid other directives")]
    #[test_case("no-store", None, None; "no freshness directives")]
    #[test_case("max-age=abc", None, None; "malformed value ignored")]
    fn test_cache_control_parse(header: &str, s_maxage: Option<u64>, max_age: Option<u64>) {
        let parsed = CacheControl::parse(header);
        assert_eq!(parsed.s_maxage, s_maxage);
        assert_eq!(parsed.max_age, max_age);
    }

    #[test]
    fn test_ttl_precedence() {
        let floor = Duration::from_secs(60);

        let both = CacheControl::parse("s-maxage=120, max-age=60");
        assert_eq!(both.ttl(floor), Duration::from_secs(120));

        let max_age = CacheControl::parse("max-age=30");
        assert_eq!(max_age.ttl(floor), Duration::from_secs(30));

        let neither = CacheControl::default();
        assert_eq!(neither.ttl(floor), floor);
    }

    #[test]
    fn test_ttl_floor_does_not_override_directive() {
        // An origin max-age below the floor still wins; the floor only
        // covers the no-directive case.
        let short = CacheControl::parse("max-age=5");
        assert_eq!(short.ttl(Duration::from_secs(60)), Duration::from_secs(5));
    }

    #[test]
    fn test_strongest_validator() {
        let both = Validators {
            etag: Some("\"abc\"".to_string()),
            last_modified: Some("Wed, 01 Jan 2025 00:00:00 GMT".to_string()),
        };
        assert_eq!(both.strongest(), Some("\"abc\""));

        let only_modified = Validators {
            etag: None,
            last_modified: Some("Wed, 01 Jan 2025 00:00:00 GMT".to_string()),
        };
        assert_eq!(only_modified.strongest(), Some("Wed, 01 Jan 2025 00:00:00 GMT"));

        assert_eq!(Validators::default().strongest(), None);
    }
}
