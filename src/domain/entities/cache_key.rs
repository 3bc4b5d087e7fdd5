//! Cache key derivation.

use sha2::{Digest, Sha256};

use super::params::ResolvedParams;

/// Deterministic digest identifying one cached variant.
///
/// A pure function of the source identity, the origin validator (when
/// known) and the resolved parameters; no randomness, no time input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a source and its resolved parameters.
    #[must_use]
    pub fn derive(source: &str, validator: Option<&str>, params: &ResolvedParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0]);
        hasher.update(validator.unwrap_or("").as_bytes());
        hasher.update([0]);
        hasher.update(params.bucket_width.to_le_bytes());
        hasher.update(params.output_format.cache_token().as_bytes());
        hasher.update([params.quality]);
        Self(hex::encode(hasher.finalize()))
    }

    /// The hex digest, used as the on-disk artifact name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
