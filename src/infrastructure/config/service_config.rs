//! Service configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::entities::TargetFormat;
use crate::domain::errors::ConfigError;

const APP_NAME: &str = "imgopt";
const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "imgopt";

/// Loader strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// The built-in optimization pipeline.
    #[default]
    Default,
    /// Rewrite to imgix URLs.
    Imgix,
    /// Rewrite to Cloudinary URLs.
    Cloudinary,
    /// Rewrite to Akamai Image Manager URLs.
    Akamai,
    /// Delegate to a caller-supplied resolver function.
    Custom,
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Imgix => write!(f, "imgix"),
            Self::Cloudinary => write!(f, "cloudinary"),
            Self::Akamai => write!(f, "akamai"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Immutable service configuration, built once at startup and passed
/// explicitly into every component constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Allow-listed hosts for absolute `src` URLs.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Loader strategy.
    #[serde(default)]
    pub loader: LoaderKind,

    /// URL prefix for non-default loaders.
    #[serde(default)]
    pub path_prefix: String,

    /// Device width breakpoints feeding the size catalog.
    #[serde(default = "default_device_sizes")]
    pub device_sizes: Vec<u32>,

    /// Image width breakpoints feeding the size catalog.
    #[serde(default = "default_image_sizes")]
    pub image_sizes: Vec<u32>,

    /// TTL floor in seconds when the origin supplies no freshness
    /// directive.
    #[serde(default = "default_minimum_cache_ttl")]
    pub minimum_cache_ttl: u64,

    /// Disables the build-time static import collaborator. Recorded
    /// here for completeness; that collaborator lives outside this
    /// service.
    #[serde(default)]
    pub disable_static_imports: bool,

    /// Output format preference order (MIME types), modern format first.
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    /// Cache root directory; defaults to the platform cache dir.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,

    /// Origin fetch deadline in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Ceiling on concurrent in-flight origin fetches; requests beyond
    /// it queue.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Ceiling on concurrent in-flight transcodes; requests beyond it
    /// queue.
    #[serde(default = "default_max_concurrent_transcodes")]
    pub max_concurrent_transcodes: usize,

    /// Capacity of the in-memory hot tier in entries.
    #[serde(default = "default_memory_cache_entries")]
    pub memory_cache_entries: usize,
}

fn default_device_sizes() -> Vec<u32> {
    vec![640, 750, 828, 1080, 1200, 1920, 2048, 3840]
}

fn default_image_sizes() -> Vec<u32> {
    vec![16, 32, 48, 64, 96, 128, 256, 384]
}

fn default_minimum_cache_ttl() -> u64 {
    60
}

fn default_formats() -> Vec<String> {
    vec!["image/webp".to_string()]
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_max_concurrent_transcodes() -> usize {
    4
}

fn default_memory_cache_entries() -> usize {
    64
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            loader: LoaderKind::default(),
            path_prefix: String::new(),
            device_sizes: default_device_sizes(),
            image_sizes: default_image_sizes(),
            minimum_cache_ttl: default_minimum_cache_ttl(),
            disable_static_imports: false,
            formats: default_formats(),
            cache_root: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_concurrent_transcodes: default_max_concurrent_transcodes(),
            memory_cache_entries: default_memory_cache_entries(),
        }
    }
}

impl ServiceConfig {
    /// Parses a configuration from TOML; all fields are optional.
    ///
    /// # Errors
    /// Returns `Parse` on malformed TOML, or any validation error.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates invariants that must hold before serving: a non-empty
    /// size catalog, a prefix for rewriting loaders, known formats.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_sizes.is_empty() && self.image_sizes.is_empty() {
            return Err(ConfigError::EmptySizeCatalog);
        }
        if matches!(
            self.loader,
            LoaderKind::Imgix | LoaderKind::Cloudinary | LoaderKind::Akamai
        ) && self.path_prefix.is_empty()
        {
            return Err(ConfigError::MissingPathPrefix {
                kind: self.loader.to_string(),
            });
        }
        self.target_formats()?;
        Ok(())
    }

    /// The configured formats resolved to encodable targets, preserving
    /// preference order.
    ///
    /// # Errors
    /// Returns `UnknownFormat` for a format the transcoder cannot encode.
    pub fn target_formats(&self) -> Result<Vec<TargetFormat>, ConfigError> {
        self.formats
            .iter()
            .map(|format| {
                TargetFormat::from_content_type(format).ok_or_else(|| ConfigError::UnknownFormat {
                    format: format.clone(),
                })
            })
            .collect()
    }

    /// Whether `host` appears in the domain allow-list.
    #[must_use]
    pub fn allows_domain(&self, host: &str) -> bool {
        self.domains.iter().any(|d| d == host)
    }

    /// The allow-list as a set, for callers doing repeated checks.
    #[must_use]
    pub fn domain_set(&self) -> HashSet<&str> {
        self.domains.iter().map(String::as_str).collect()
    }

    /// The TTL floor as a duration.
    #[must_use]
    pub const fn minimum_ttl(&self) -> Duration {
        Duration::from_secs(self.minimum_cache_ttl)
    }

    /// The origin fetch deadline as a duration.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The effective cache root: the configured directory, the platform
    /// cache dir, or a temp-dir fallback.
    #[must_use]
    pub fn effective_cache_root(&self) -> PathBuf {
        self.cache_root.clone().unwrap_or_else(default_cache_root)
    }
}

/// The default cache root path.
fn default_cache_root() -> PathBuf {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
        || std::env::temp_dir().join(APP_NAME).join("cache"),
        |dirs| dirs.cache_dir().join("variants"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_table() {
        let config = ServiceConfig::default();
        assert!(config.domains.is_empty());
        assert_eq!(config.loader, LoaderKind::Default);
        assert_eq!(
            config.device_sizes,
            [640, 750, 828, 1080, 1200, 1920, 2048, 3840]
        );
        assert_eq!(config.image_sizes, [16, 32, 48, 64, 96, 128, 256, 384]);
        assert_eq!(config.minimum_cache_ttl, 60);
        assert!(!config.disable_static_imports);
        assert_eq!(config.formats, ["image/webp"]);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            domains = ["cdn.example.com"]
            minimum_cache_ttl = 120
            formats = ["image/webp", "image/jpeg"]
            "#,
        )
        .unwrap();

        assert!(config.allows_domain("cdn.example.com"));
        assert!(!config.allows_domain("other.example.com"));
        assert_eq!(config.minimum_cache_ttl, 120);
        assert_eq!(
            config.target_formats().unwrap(),
            [TargetFormat::Webp, TargetFormat::Jpeg]
        );
        // Unspecified fields keep their defaults.
        assert_eq!(config.device_sizes.len(), 8);
    }

    #[test]
    fn test_empty_size_arrays_rejected() {
        let result = ServiceConfig::from_toml_str("device_sizes = []\nimage_sizes = []");
        assert!(matches!(result, Err(ConfigError::EmptySizeCatalog)));
    }

    #[test]
    fn test_rewriting_loader_requires_prefix() {
        let result = ServiceConfig::from_toml_str(r#"loader = "imgix""#);
        assert!(matches!(result, Err(ConfigError::MissingPathPrefix { .. })));

        let ok = ServiceConfig::from_toml_str(
            r#"
            loader = "imgix"
            path_prefix = "https://example.imgix.net/"
            "#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = ServiceConfig::from_toml_str(r#"formats = ["image/avif"]"#);
        assert!(matches!(result, Err(ConfigError::UnknownFormat { .. })));
    }
}
