//! Loader strategies.
//!
//! A non-default loader rewrites requests into an external provider's
//! URL and bypasses the fetch/transcode/cache pipeline entirely; the
//! provider owns freshness and storage on that path.

pub mod providers;

use std::sync::Arc;

use crate::domain::errors::ConfigError;
use crate::infrastructure::config::{LoaderKind, ServiceConfig};

use providers::{akamai_url, cloudinary_url, imgix_url};

/// Caller-supplied resolver for the custom loader.
pub type CustomResolverFn = Arc<dyn Fn(&str, u32, u8) -> String + Send + Sync>;

/// Closed set of loader strategies, dispatched through `resolve_url`.
#[derive(Clone)]
pub enum LoaderAdapter {
    /// Serve through the local optimization pipeline.
    Default,
    /// Rewrite to imgix.
    Imgix {
        /// Provider URL prefix.
        prefix: String,
    },
    /// Rewrite to Cloudinary.
    Cloudinary {
        /// Provider URL prefix.
        prefix: String,
    },
    /// Rewrite to Akamai Image Manager.
    Akamai {
        /// Provider URL prefix.
        prefix: String,
    },
    /// Delegate to a caller-supplied resolver.
    Custom(CustomResolverFn),
}

impl std::fmt::Debug for LoaderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "LoaderAdapter::Default"),
            Self::Imgix { prefix } => write!(f, "LoaderAdapter::Imgix({prefix})"),
            Self::Cloudinary { prefix } => write!(f, "LoaderAdapter::Cloudinary({prefix})"),
            Self::Akamai { prefix } => write!(f, "LoaderAdapter::Akamai({prefix})"),
            Self::Custom(_) => write!(f, "LoaderAdapter::Custom"),
        }
    }
}

impl LoaderAdapter {
    /// Builds the adapter selected by the configuration.
    ///
    /// # Errors
    /// `MissingPathPrefix` for rewriting loaders without a prefix;
    /// `MissingCustomResolver` when `loader = "custom"` but no resolver
    /// was supplied.
    pub fn from_config(
        config: &ServiceConfig,
        custom_resolver: Option<CustomResolverFn>,
    ) -> Result<Self, ConfigError> {
        let prefix = || {
            if config.path_prefix.is_empty() {
                Err(ConfigError::MissingPathPrefix {
                    kind: config.loader.to_string(),
                })
            } else {
                Ok(config.path_prefix.clone())
            }
        };

        match config.loader {
            LoaderKind::Default => Ok(Self::Default),
            LoaderKind::Imgix => Ok(Self::Imgix { prefix: prefix()? }),
            LoaderKind::Cloudinary => Ok(Self::Cloudinary { prefix: prefix()? }),
            LoaderKind::Akamai => Ok(Self::Akamai { prefix: prefix()? }),
            LoaderKind::Custom => custom_resolver
                .map(Self::Custom)
                .ok_or(ConfigError::MissingCustomResolver),
        }
    }

    /// Whether requests should run through the local pipeline.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Resolves the external URL for a bypassed request.
    ///
    /// Only meaningful for non-default loaders; the default loader
    /// returns the source unchanged.
    #[must_use]
    pub fn resolve_url(&self, src: &str, width: u32, quality: u8) -> String {
        match self {
            Self::Default => src.to_string(),
            Self::Imgix { prefix } => imgix_url(prefix, src, width, quality),
            Self::Cloudinary { prefix } => cloudinary_url(prefix, src, width, quality),
            Self::Akamai { prefix } => akamai_url(prefix, src, width),
            Self::Custom(resolver) => resolver(src, width, quality),
        }
    }
}
