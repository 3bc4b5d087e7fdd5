//! Domain entity definitions.

mod cache_key;
mod origin;
mod params;
mod request;
mod variant;

pub use cache_key::CacheKey;
pub use origin::{CacheControl, ImageSrc, OriginResource, Validators};
pub use params::{OutputFormat, ResolvedParams, TargetFormat};
pub use request::{DEFAULT_QUALITY, LayoutHint, OptimizationRequest};
pub use variant::{CacheEntry, CacheStatus};
