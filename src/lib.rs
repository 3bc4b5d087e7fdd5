//! imgopt - A request-time image optimization and caching service.
//!
//! This crate fetches source images from allow-listed origins or the
//! local filesystem, resizes and re-encodes them into negotiated output
//! formats, and caches the resulting variants on disk with TTLs derived
//! from upstream freshness headers. Concurrent requests for the same
//! variant are coalesced into a single build.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the optimization service and coalescer.
pub mod application;
/// Domain layer containing entities, errors, ports, and pure services.
pub mod domain;
/// Infrastructure layer containing adapters for external resources.
pub mod infrastructure;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const NAME: &str = "imgopt";
