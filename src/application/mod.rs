//! Application layer orchestrating the domain and infrastructure.

/// Application services.
pub mod services;

pub use services::{ImageResponse, OptimizationService, OptimizeOutcome, RequestCoalescer};
