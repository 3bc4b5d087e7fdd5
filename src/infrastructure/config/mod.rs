//! Service configuration.

pub mod service_config;

pub use service_config::{LoaderKind, ServiceConfig};
