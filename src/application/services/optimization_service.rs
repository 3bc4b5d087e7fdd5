//! Per-request orchestration of the optimization pipeline.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::domain::entities::{
    CacheKey, CacheStatus, ImageSrc, OptimizationRequest, OutputFormat, ResolvedParams,
    TargetFormat,
};
use crate::domain::errors::{ConfigError, OptimizeError, OptimizeResult};
use crate::domain::ports::{CacheLookup, CacheStorePort, OriginFetcherPort, TranscoderPort};
use crate::domain::services::{SizeCatalog, format_negotiator};
use crate::infrastructure::cache::DiskVariantStore;
use crate::infrastructure::config::ServiceConfig;
use crate::infrastructure::loaders::LoaderAdapter;
use crate::infrastructure::origin::HttpOriginFetcher;
use crate::infrastructure::transcode::ImageTranscoder;

use super::request_coalescer::{BuildResult, BuiltVariant, RequestCoalescer};

/// A successfully served image.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    /// The response body.
    pub bytes: Bytes,
    /// Negotiated `Content-Type`.
    pub content_type: String,
    /// Diagnostic cache disposition (HIT/MISS/STALE).
    pub cache_status: CacheStatus,
    /// Seconds of freshness, mirrored into `Cache-Control`.
    pub max_age: u64,
}

impl ImageResponse {
    /// The `Cache-Control` response header value.
    #[must_use]
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.max_age)
    }
}

/// Terminal outcome of one request.
#[derive(Debug, Clone)]
pub enum OptimizeOutcome {
    /// Image bytes served by the local pipeline.
    Image(ImageResponse),
    /// Loader bypass: redirect the client to the external provider.
    Redirect(String),
}

/// Orchestrates normalization, cache lookup, coalesced builds, and
/// serving for each optimization request.
pub struct OptimizationService {
    config: Arc<ServiceConfig>,
    catalog: SizeCatalog,
    formats: Vec<TargetFormat>,
    loader: LoaderAdapter,
    fetcher: Arc<dyn OriginFetcherPort>,
    transcoder: Arc<dyn TranscoderPort>,
    store: Arc<dyn CacheStorePort>,
    coalescer: RequestCoalescer,
}

impl std::fmt::Debug for OptimizationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationService")
            .field("catalog", &self.catalog)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl OptimizationService {
    /// Wires a service from explicit collaborators.
    ///
    /// # Errors
    /// Returns a `ConfigError` when the configuration fails validation.
    pub fn new(
        config: Arc<ServiceConfig>,
        loader: LoaderAdapter,
        fetcher: Arc<dyn OriginFetcherPort>,
        transcoder: Arc<dyn TranscoderPort>,
        store: Arc<dyn CacheStorePort>,
    ) -> Result<Self, ConfigError> {
        let catalog = SizeCatalog::new(&config.device_sizes, &config.image_sizes)?;
        let formats = config.target_formats()?;

        info!(
            breakpoints = catalog.widths().len(),
            loader = %config.loader,
            "Optimization service ready"
        );

        Ok(Self {
            config,
            catalog,
            formats,
            loader,
            fetcher,
            transcoder,
            store,
            coalescer: RequestCoalescer::new(),
        })
    }

    /// Wires the default production stack: HTTP/file origin fetcher,
    /// image-crate transcoder, disk store under the configured cache
    /// root.
    ///
    /// # Errors
    /// Returns a `ConfigError` when validation fails or the cache root
    /// cannot be initialized.
    pub async fn with_default_stack(config: Arc<ServiceConfig>) -> Result<Self, ConfigError> {
        config.validate()?;

        let loader = LoaderAdapter::from_config(&config, None)?;
        let fetcher = HttpOriginFetcher::new(Arc::clone(&config))
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        let transcoder = ImageTranscoder::new(config.max_concurrent_transcodes);
        let store = DiskVariantStore::new(
            config.effective_cache_root(),
            config.memory_cache_entries,
        )
        .await
        .map_err(|e| ConfigError::CacheRoot {
            message: e.to_string(),
        })?;

        Self::new(
            config,
            loader,
            Arc::new(fetcher),
            Arc::new(transcoder),
            Arc::new(store),
        )
    }

    /// Normalizes a request into its cacheable projection.
    #[must_use]
    pub fn resolve_params(&self, request: &OptimizationRequest) -> ResolvedParams {
        let target = format_negotiator::client_target(request.accepted_formats(), &self.formats);
        ResolvedParams {
            bucket_width: self.catalog.resolve(request.requested_width()),
            output_format: target.map_or(OutputFormat::Passthrough, OutputFormat::Target),
            quality: request.quality(),
        }
    }

    /// Serves one request.
    ///
    /// # Errors
    /// `ForbiddenDomain` for an unlisted remote host (before any I/O),
    /// `OriginUnavailable`/`OriginTimeout` when the build's fetch fails;
    /// coalesced waiters all observe the same error.
    pub async fn handle(&self, request: &OptimizationRequest) -> OptimizeResult<OptimizeOutcome> {
        let params = self.resolve_params(request);

        if !self.loader.is_default() {
            let url = self
                .loader
                .resolve_url(request.src(), params.bucket_width, params.quality);
            debug!(src = %request.src(), url = %url, "Loader bypass");
            return Ok(OptimizeOutcome::Redirect(url));
        }

        let src = ImageSrc::parse(request.src())?;
        if let ImageSrc::Remote { host, .. } = &src {
            if !self.config.allows_domain(host) {
                warn!(host = %host, "Rejected src outside domain allow-list");
                return Err(OptimizeError::forbidden_domain(host.clone()));
            }
        }

        let key = CacheKey::derive(&src.identity(), None, &params);

        match self.store.lookup(&key).await {
            CacheLookup::Fresh(entry) => {
                debug!(key = %key, "Serving fresh variant");
                let max_age = entry.remaining_ttl(SystemTime::now()).as_secs();
                Ok(OptimizeOutcome::Image(ImageResponse {
                    bytes: entry.bytes,
                    content_type: entry.content_type,
                    cache_status: CacheStatus::Hit,
                    max_age,
                }))
            }
            CacheLookup::Expired(_) => {
                debug!(key = %key, "Variant expired, rebuilding");
                self.build(request, key, src, params, CacheStatus::Stale, true)
                    .await
            }
            CacheLookup::Miss => {
                self.build(request, key, src, params, CacheStatus::Miss, false)
                    .await
            }
        }
    }

    /// Runs (or joins) the coalesced build for `key` and shapes the
    /// response.
    #[allow(clippy::too_many_arguments)]
    async fn build(
        &self,
        request: &OptimizationRequest,
        key: CacheKey,
        src: ImageSrc,
        params: ResolvedParams,
        status: CacheStatus,
        evict_first: bool,
    ) -> OptimizeResult<OptimizeOutcome> {
        let fetcher = Arc::clone(&self.fetcher);
        let transcoder = Arc::clone(&self.transcoder);
        let store = Arc::clone(&self.store);
        let minimum_ttl = self.config.minimum_ttl();
        let accepted = request.accepted_formats().to_vec();
        let configured = self.formats.clone();
        let build_key = key.clone();

        let variant = self
            .coalescer
            .run(&key, move || {
                build_variant(
                    fetcher,
                    transcoder,
                    store,
                    build_key,
                    src,
                    params,
                    accepted,
                    configured,
                    minimum_ttl,
                    evict_first,
                )
                .boxed()
            })
            .await?;

        Ok(OptimizeOutcome::Image(ImageResponse {
            bytes: variant.bytes,
            content_type: variant.content_type,
            cache_status: status,
            max_age: variant.max_age,
        }))
    }
}

/// One build cycle: fetch the origin, transcode (or fall back to
/// passthrough), persist, and publish the variant.
///
/// Runs as a detached task under the coalescer, so it completes even if
/// the originating client disconnects.
#[allow(clippy::too_many_arguments)]
async fn build_variant(
    fetcher: Arc<dyn OriginFetcherPort>,
    transcoder: Arc<dyn TranscoderPort>,
    store: Arc<dyn CacheStorePort>,
    key: CacheKey,
    src: ImageSrc,
    params: ResolvedParams,
    accepted: Vec<String>,
    configured: Vec<TargetFormat>,
    minimum_ttl: std::time::Duration,
    evict_first: bool,
) -> BuildResult {
    if evict_first {
        // The expired entry is fully removed before its replacement is
        // written; doing it inside the coalesced build keeps eviction
        // from racing a concurrent rebuild of the same key.
        store.evict(&key).await;
    }

    let origin = fetcher.fetch(&src).await?;
    let ttl = origin.cache_control.ttl(minimum_ttl);
    let max_age = ttl.as_secs();

    // Re-run the full negotiation now that the origin content type is
    // known; the pre-fetch target in `params` fed the cache key.
    let effective_target =
        match format_negotiator::negotiate(&accepted, &origin.content_type, &configured) {
            OutputFormat::Target(format) => Some(format),
            OutputFormat::Passthrough => None,
        };

    let (bytes, content_type, cacheable) = match effective_target {
        Some(format) => {
            match transcoder
                .transcode(
                    origin.bytes.clone(),
                    params.bucket_width,
                    format,
                    params.quality,
                )
                .await
            {
                Ok(out) => (out, format.content_type().to_string(), true),
                Err(OptimizeError::UnsupportedSourceFormat { message }) => {
                    // Serve the source unmodified; skip the cache write
                    // since the stored variant would not match what the
                    // key promises.
                    warn!(key = %key, error = %message, "Transcode unsupported, serving passthrough");
                    (origin.bytes.clone(), origin.content_type.clone(), false)
                }
                Err(e) => return Err(e),
            }
        }
        // Negotiated or forced passthrough is the variant for this key;
        // it is cached like any other.
        None => (origin.bytes.clone(), origin.content_type.clone(), true),
    };

    if cacheable {
        if let Err(e) = store
            .put(&key, bytes.clone(), &content_type, ttl, &origin.validators)
            .await
        {
            // Serve what we built; losing the cache write only costs a
            // rebuild on the next request.
            warn!(key = %key, error = %e, "Cache write failed, serving uncached");
        }
    }

    Ok(BuiltVariant {
        bytes,
        content_type,
        max_age,
    })
}
