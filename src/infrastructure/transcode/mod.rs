//! Transcoding infrastructure.

pub mod image_transcoder;

pub use image_transcoder::{DEFAULT_MAX_CONCURRENT, ImageTranscoder};
