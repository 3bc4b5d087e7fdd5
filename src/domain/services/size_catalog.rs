//! Width breakpoint catalog.

use crate::domain::errors::ConfigError;

/// Sorted, deduplicated union of the configured device and image width
/// breakpoints. Built once at startup and shared immutably.
#[derive(Debug, Clone)]
pub struct SizeCatalog {
    widths: Vec<u32>,
}

impl SizeCatalog {
    /// Builds the catalog from the two configured width arrays.
    ///
    /// # Errors
    /// Returns `EmptySizeCatalog` when both arrays are empty.
    pub fn new(device_sizes: &[u32], image_sizes: &[u32]) -> Result<Self, ConfigError> {
        let mut widths: Vec<u32> = device_sizes
            .iter()
            .chain(image_sizes)
            .copied()
            .filter(|w| *w > 0)
            .collect();
        widths.sort_unstable();
        widths.dedup();

        if widths.is_empty() {
            return Err(ConfigError::EmptySizeCatalog);
        }
        Ok(Self { widths })
    }

    /// Resolves a requested width to the smallest catalog entry that is
    /// at least as wide, clamping to the maximum when the request
    /// exceeds every breakpoint.
    #[must_use]
    pub fn resolve(&self, requested_width: u32) -> u32 {
        self.widths
            .iter()
            .copied()
            .find(|w| *w >= requested_width)
            .unwrap_or(self.max_width())
    }

    /// The largest breakpoint in the catalog.
    #[must_use]
    pub fn max_width(&self) -> u32 {
        *self.widths.last().unwrap_or(&0)
    }

    /// All breakpoints, ascending.
    #[must_use]
    pub fn widths(&self) -> &[u32] {
        &self.widths
    }
}
