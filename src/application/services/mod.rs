//! Application service implementations.

pub mod optimization_service;
pub mod request_coalescer;

pub use optimization_service::{ImageResponse, OptimizationService, OptimizeOutcome};
pub use request_coalescer::{BuildResult, BuiltVariant, RequestCoalescer};
