//! Incoming optimization request.

use crate::domain::errors::{OptimizeError, OptimizeResult};

/// Default quality when the request does not specify one.
pub const DEFAULT_QUALITY: u8 = 75;

/// How the client intends to lay the image out.
///
/// Carried for diagnostics only; the pipeline treats all hints the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayoutHint {
    /// Fixed pixel dimensions.
    Fixed,
    /// Natural size of the source image.
    Intrinsic,
    /// Scales with the container width.
    #[default]
    Responsive,
    /// Fills the parent element.
    Fill,
}

/// A single image optimization request, immutable once constructed.
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    src: String,
    requested_width: u32,
    quality: u8,
    accepted_formats: Vec<String>,
    layout_hint: LayoutHint,
}

impl OptimizationRequest {
    /// Creates a validated request.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for an empty `src`, a zero width, or a
    /// quality outside `1..=100`.
    pub fn new(src: impl Into<String>, requested_width: u32, quality: u8) -> OptimizeResult<Self> {
        let src = src.into();
        if src.is_empty() {
            return Err(OptimizeError::invalid_request("src must not be empty"));
        }
        if requested_width == 0 {
            return Err(OptimizeError::invalid_request("width must be positive"));
        }
        if !(1..=100).contains(&quality) {
            return Err(OptimizeError::invalid_request(
                "quality must be between 1 and 100",
            ));
        }
        Ok(Self {
            src,
            requested_width,
            quality,
            accepted_formats: Vec::new(),
            layout_hint: LayoutHint::default(),
        })
    }

    /// Parses a request from the query component of the optimize endpoint
    /// (`src=<url-or-path>&w=<int>&q=<int>`).
    ///
    /// # Errors
    /// Returns `InvalidRequest` when `src` or `w` are missing or malformed.
    pub fn from_query(query: &str) -> OptimizeResult<Self> {
        let url = reqwest::Url::parse(&format!("optimize:/?{query}"))
            .map_err(|e| OptimizeError::invalid_request(format!("malformed query: {e}")))?;

        let mut src = None;
        let mut width = None;
        let mut quality = DEFAULT_QUALITY;
        let mut accept = None;

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "src" => src = Some(value.into_owned()),
                "w" => {
                    width = Some(value.parse::<u32>().map_err(|_| {
                        OptimizeError::invalid_request(format!("invalid width: {value}"))
                    })?);
                }
                "q" => {
                    quality = value.parse::<u8>().map_err(|_| {
                        OptimizeError::invalid_request(format!("invalid quality: {value}"))
                    })?;
                }
                "accept" => accept = Some(value.into_owned()),
                _ => {}
            }
        }

        let src = src.ok_or_else(|| OptimizeError::invalid_request("missing src parameter"))?;
        let width =
            width.ok_or_else(|| OptimizeError::invalid_request("missing width parameter"))?;

        let request = Self::new(src, width, quality)?;
        Ok(match accept {
            Some(header) => request.with_accept_header(&header),
            None => request,
        })
    }

    /// Records the client's `Accept` header, split into media ranges in
    /// client preference order (weights preserved for negotiation).
    #[must_use]
    pub fn with_accept_header(mut self, header: &str) -> Self {
        self.accepted_formats = header
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        self
    }

    /// Sets the layout hint.
    #[must_use]
    pub fn with_layout_hint(mut self, hint: LayoutHint) -> Self {
        self.layout_hint = hint;
        self
    }

    /// The source path or absolute URL.
    #[must_use]
    pub fn src(&self) -> &str {
        &self.src
    }

    /// The width the client asked for.
    #[must_use]
    pub const fn requested_width(&self) -> u32 {
        self.requested_width
    }

    /// The requested quality in `1..=100`.
    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }

    /// Media ranges the client accepts, in client order.
    #[must_use]
    pub fn accepted_formats(&self) -> &[String] {
        &self.accepted_formats
    }

    /// The layout hint, if the caller provided one.
    #[must_use]
    pub const fn layout_hint(&self) -> LayoutHint {
        self.layout_hint
    }
}
