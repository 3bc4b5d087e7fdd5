//! Variant cache infrastructure.
//!
//! A disk store holds one artifact plus metadata sidecar per cache key;
//! a small in-memory LRU tier fronts it for hot variants.

pub mod disk_store;
pub mod memory_tier;

pub use disk_store::DiskVariantStore;
pub use memory_tier::MemoryVariantCache;
