//! Infrastructure layer with adapters for external resources.

/// Variant cache (disk store + memory tier).
pub mod cache;
/// Service configuration.
pub mod config;
/// Loader strategies and provider URL rewriting.
pub mod loaders;
/// Origin retrieval (HTTP and local filesystem).
pub mod origin;
/// Image transcoding on a bounded worker pool.
pub mod transcode;

pub use cache::{DiskVariantStore, MemoryVariantCache};
pub use config::{LoaderKind, ServiceConfig};
pub use loaders::{CustomResolverFn, LoaderAdapter};
pub use origin::{HttpOriginFetcher, sniff_content_type};
pub use transcode::ImageTranscoder;
