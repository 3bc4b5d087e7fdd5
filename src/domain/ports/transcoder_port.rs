//! Port definition for image transcoding.

use bytes::Bytes;

use crate::domain::entities::TargetFormat;
use crate::domain::errors::OptimizeResult;

/// Port for resizing and re-encoding image bytes.
/// Implementations must be thread-safe and bound their own concurrency.
#[async_trait::async_trait]
pub trait TranscoderPort: Send + Sync {
    /// Resizes `bytes` to `target_width` (preserving aspect ratio, never
    /// enlarging) and re-encodes at `quality` in `format`.
    ///
    /// # Errors
    /// `UnsupportedSourceFormat` when the input cannot be decoded; the
    /// caller falls back to serving the original bytes.
    async fn transcode(
        &self,
        bytes: Bytes,
        target_width: u32,
        format: TargetFormat,
        quality: u8,
    ) -> OptimizeResult<Bytes>;
}
