//! CPU-bound resize and re-encode on a bounded worker pool.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageFormat};
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::domain::entities::TargetFormat;
use crate::domain::errors::{OptimizeError, OptimizeResult};
use crate::domain::ports::TranscoderPort;

/// Default ceiling on concurrent in-flight transcodes.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Transcoder backed by the `image` crate.
///
/// Encoding runs on the blocking pool behind a semaphore, so a burst of
/// large transcodes queues instead of starving request intake.
#[derive(Debug)]
pub struct ImageTranscoder {
    semaphore: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
}

impl ImageTranscoder {
    /// Creates a transcoder with the given concurrency ceiling.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Transcodes queued or in flight right now; the backpressure gauge.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// Decrements the pending gauge even when a transcode errors out early.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl TranscoderPort for ImageTranscoder {
    async fn transcode(
        &self,
        bytes: Bytes,
        target_width: u32,
        format: TargetFormat,
        quality: u8,
    ) -> OptimizeResult<Bytes> {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let _guard = PendingGuard(Arc::clone(&self.pending));

        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| OptimizeError::unexpected("transcode pool closed"))?;

        let output = tokio::task::spawn_blocking(move || {
            encode_variant(&bytes, target_width, format, quality)
        })
        .await
        .map_err(|e| OptimizeError::unexpected(format!("transcode task panicked: {e}")))?;

        drop(permit);

        if let Ok(out) = &output {
            debug!(
                width = target_width,
                format = %format,
                quality = quality,
                size = out.len(),
                "Transcode complete"
            );
        }
        output
    }
}

/// Decodes, resizes preserving aspect ratio, and re-encodes.
fn encode_variant(
    bytes: &[u8],
    target_width: u32,
    format: TargetFormat,
    quality: u8,
) -> OptimizeResult<Bytes> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| OptimizeError::unsupported_source(e.to_string()))?;

    let resized = resize_to_width(&decoded, target_width);
    let mut buffer = Vec::new();

    match format {
        TargetFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            resized
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| OptimizeError::unexpected(format!("jpeg encode failed: {e}")))?;
        }
        TargetFormat::Png => {
            resized
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                .map_err(|e| OptimizeError::unexpected(format!("png encode failed: {e}")))?;
        }
        TargetFormat::Webp => {
            // The image crate encodes WebP lossless only; quality does
            // not apply.
            let rgba = resized.to_rgba8();
            WebPEncoder::new_lossless(&mut buffer)
                .encode(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| OptimizeError::unexpected(format!("webp encode failed: {e}")))?;
        }
    }

    Ok(Bytes::from(buffer))
}

/// Scales down to `target_width` with the height rounded from the
/// original aspect ratio. Sources narrower than the target are left at
/// their natural size; this pipeline never enlarges.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resize_to_width(image: &DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if target_width >= width {
        return image.clone();
    }

    let scaled_height =
        ((f64::from(height) * f64::from(target_width) / f64::from(width)).round() as u32).max(1);
    trace!(
        "Resizing image {width}x{height} -> {target_width}x{scaled_height}"
    );
    image.resize_exact(target_width, scaled_height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_fixture(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer)
    }

    #[tokio::test]
    async fn test_resize_preserves_aspect_ratio() {
        let transcoder = ImageTranscoder::default();
        let source = png_fixture(400, 300);

        let out = transcoder
            .transcode(source, 200, TargetFormat::Png, 75)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 200);
        assert_eq!(decoded.height(), 150);
    }

    #[tokio::test]
    async fn test_height_rounding() {
        // 333x100 at width 100 -> height round(100 * 100 / 333) = 30.
        let transcoder = ImageTranscoder::default();
        let source = png_fixture(333, 100);

        let out = transcoder
            .transcode(source, 100, TargetFormat::Png, 75)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.height(), 30);
    }

    #[tokio::test]
    async fn test_never_enlarges() {
        let transcoder = ImageTranscoder::default();
        let source = png_fixture(100, 50);

        let out = transcoder
            .transcode(source, 640, TargetFormat::Png, 75)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 50);
    }

    #[tokio::test]
    async fn test_jpeg_and_webp_outputs() {
        let transcoder = ImageTranscoder::default();
        let source = png_fixture(64, 64);

        let jpeg = transcoder
            .transcode(source.clone(), 32, TargetFormat::Jpeg, 60)
            .await
            .unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));

        let webp = transcoder
            .transcode(source, 32, TargetFormat::Webp, 60)
            .await
            .unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[tokio::test]
    async fn test_undecodable_input_is_unsupported() {
        let transcoder = ImageTranscoder::default();
        let result = transcoder
            .transcode(Bytes::from_static(b"not an image"), 100, TargetFormat::Webp, 75)
            .await;

        assert!(matches!(
            result,
            Err(OptimizeError::UnsupportedSourceFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_pending_gauge_settles() {
        let transcoder = ImageTranscoder::new(1);
        let source = png_fixture(64, 64);

        let _ = transcoder
            .transcode(source, 32, TargetFormat::Png, 75)
            .await
            .unwrap();
        assert_eq!(transcoder.pending_count(), 0);
    }
}
