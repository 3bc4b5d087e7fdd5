//! Startup-time configuration errors.

use thiserror::Error;

/// Configuration error variants; fatal at startup, never per-request.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Both size arrays were empty, leaving nothing to resolve against.
    #[error("size catalog is empty: configure device_sizes or image_sizes")]
    EmptySizeCatalog,

    /// A non-default loader was selected without a path prefix.
    #[error("loader `{kind}` requires a path_prefix")]
    MissingPathPrefix {
        /// The loader kind that was configured.
        kind: String,
    },

    /// `loader = "custom"` without a resolver function supplied.
    #[error("custom loader requires a resolver function")]
    MissingCustomResolver,

    /// A configured output format the transcoder cannot encode.
    #[error("unsupported output format: {format}")]
    UnknownFormat {
        /// The offending format string.
        format: String,
    },

    /// The cache root could not be created.
    #[error("cannot initialize cache root: {message}")]
    CacheRoot {
        /// Underlying I/O failure description.
        message: String,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),
}
