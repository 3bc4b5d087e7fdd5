//! Pure domain services.

pub mod format_negotiator;
pub mod size_catalog;

pub use size_catalog::SizeCatalog;
