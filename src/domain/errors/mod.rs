//! Domain error types.

mod config_error;
mod optimize_error;

pub use config_error::ConfigError;
pub use optimize_error::{OptimizeError, OptimizeResult};
