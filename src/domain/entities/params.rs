//! Normalized, cacheable projection of a request.

/// An output format the transcoder can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// `image/webp` (lossless encode).
    Webp,
    /// `image/jpeg` (quality applies).
    Jpeg,
    /// `image/png` (quality ignored).
    Png,
}

impl TargetFormat {
    /// The MIME type served for this format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Short token folded into cache keys.
    #[must_use]
    pub const fn cache_token(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// Maps a MIME type to a target format, if encodable.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/webp" => Some(Self::Webp),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.content_type())
    }
}

/// The negotiated output of a request: either a transcode target or
/// passthrough of the origin bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Re-encode into the given format.
    Target(TargetFormat),
    /// Serve the origin content type unmodified.
    Passthrough,
}

impl OutputFormat {
    /// Short token folded into cache keys.
    #[must_use]
    pub const fn cache_token(self) -> &'static str {
        match self {
            Self::Target(format) => format.cache_token(),
            Self::Passthrough => "origin",
        }
    }
}

/// The normalized parameters a request maps to.
///
/// Two requests with identical `ResolvedParams` and identical source
/// identity share one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedParams {
    /// Catalog breakpoint the requested width was rounded up to.
    pub bucket_width: u32,
    /// Negotiated output format.
    pub output_format: OutputFormat,
    /// Encoding quality in `1..=100`.
    pub quality: u8,
}
