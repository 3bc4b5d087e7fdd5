//! Port definitions.

mod cache_store_port;
mod origin_port;
mod transcoder_port;

pub use cache_store_port::{CacheLookup, CacheStorePort};
pub use origin_port::OriginFetcherPort;
pub use transcoder_port::TranscoderPort;
