//! Port definition for origin retrieval.

use crate::domain::entities::{ImageSrc, OriginResource};
use crate::domain::errors::OptimizeResult;

/// Port for fetching source images from their origin.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait OriginFetcherPort: Send + Sync {
    /// Retrieves the source bytes and freshness metadata.
    ///
    /// Absolute URLs must pass the domain allow-list before any network
    /// I/O happens; local paths are read directly.
    ///
    /// # Errors
    /// `ForbiddenDomain` for an unlisted host, `OriginUnavailable` on
    /// network or filesystem failure, `OriginTimeout` past the deadline.
    async fn fetch(&self, src: &ImageSrc) -> OptimizeResult<OriginResource>;
}
