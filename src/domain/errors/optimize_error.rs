//! Per-request error taxonomy.

use thiserror::Error;

/// Result type for the optimization request path.
pub type OptimizeResult<T> = std::result::Result<T, OptimizeError>;

/// Errors that can occur while serving one optimization request.
///
/// Clone so coalesced builds can broadcast one failure to every waiter.
#[derive(Debug, Clone, Error)]
pub enum OptimizeError {
    /// Malformed request parameters.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request.
        reason: String,
    },

    /// Absolute-URL host absent from the configured allow-list.
    #[error("domain not allowed: {host}")]
    ForbiddenDomain {
        /// The rejected host.
        host: String,
    },

    /// Origin fetch failed or returned a non-2xx status.
    #[error("origin unavailable: {message}")]
    OriginUnavailable {
        /// Underlying failure description.
        message: String,
    },

    /// Origin fetch exceeded its deadline.
    #[error("origin fetch timed out after {timeout_secs}s")]
    OriginTimeout {
        /// The deadline that was exceeded.
        timeout_secs: u64,
    },

    /// The source bytes could not be decoded; callers fall back to
    /// passthrough.
    #[error("unsupported source format: {message}")]
    UnsupportedSourceFormat {
        /// Decoder failure description.
        message: String,
    },

    /// Cache store I/O failure; recovered by serving without caching.
    #[error("cache store error: {message}")]
    CacheIo {
        /// Underlying failure description.
        message: String,
    },

    /// Internal failure (task panic, poisoned channel).
    #[error("unexpected error: {message}")]
    Unexpected {
        /// Failure description.
        message: String,
    },
}

impl OptimizeError {
    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Creates a forbidden domain error.
    #[must_use]
    pub fn forbidden_domain(host: impl Into<String>) -> Self {
        Self::ForbiddenDomain { host: host.into() }
    }

    /// Creates an origin unavailable error.
    #[must_use]
    pub fn origin_unavailable(message: impl Into<String>) -> Self {
        Self::OriginUnavailable {
            message: message.into(),
        }
    }

    /// Creates an unsupported source format error.
    #[must_use]
    pub fn unsupported_source(message: impl Into<String>) -> Self {
        Self::UnsupportedSourceFormat {
            message: message.into(),
        }
    }

    /// Creates a cache I/O error.
    #[must_use]
    pub fn cache_io(message: impl Into<String>) -> Self {
        Self::CacheIo {
            message: message.into(),
        }
    }

    /// Creates an unexpected error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// The conceptual HTTP status this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. } => 400,
            Self::ForbiddenDomain { .. } => 403,
            Self::OriginUnavailable { .. } | Self::OriginTimeout { .. } => 502,
            Self::UnsupportedSourceFormat { .. } | Self::CacheIo { .. } | Self::Unexpected { .. } => {
                500
            }
        }
    }

    /// Whether the pipeline recovers from this error locally instead of
    /// failing the request.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSourceFormat { .. } | Self::CacheIo { .. }
        )
    }
}
