//! Origin retrieval infrastructure.

pub mod fetcher;

pub use fetcher::{HttpOriginFetcher, sniff_content_type};
