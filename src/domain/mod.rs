//! Domain layer with core entities, errors, ports, and pure services.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Pure domain services.
pub mod services;

pub use entities::{CacheKey, CacheStatus, OptimizationRequest, ResolvedParams};
pub use errors::{ConfigError, OptimizeError, OptimizeResult};
pub use ports::{CacheLookup, CacheStorePort, OriginFetcherPort, TranscoderPort};
pub use services::SizeCatalog;
