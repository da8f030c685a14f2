//! Entry points for the two analysis capabilities: trajectory exposure and
//! building retrieval. Both share one fetcher and therefore one cache.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trajexp_core::config::ExposureConfig;
use trajexp_core::error::Result;
use trajexp_core::models::{BoundingRegion, Trajectory};
use trajexp_core::ports::{FetchOutcome, ProgressReporter};
use trajexp_osm::{FetchCache, FootprintFetcher, OverpassTransport, ReqwestTransport};

use crate::models::RunReport;
use crate::pipeline::Pipeline;

pub struct ExposureEngine<T: OverpassTransport = ReqwestTransport> {
    pipeline: Pipeline<Arc<FootprintFetcher<T>>>,
}

impl ExposureEngine<ReqwestTransport> {
    /// Engine talking to the configured Overpass endpoint over HTTP
    pub fn from_config(config: &ExposureConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.fetch_timeout())?;
        Ok(Self::new(transport, Arc::new(FetchCache::new())))
    }
}

impl<T: OverpassTransport + 'static> ExposureEngine<T> {
    pub fn new(transport: T, cache: Arc<FetchCache>) -> Self {
        let fetcher = Arc::new(FootprintFetcher::new(transport, cache));
        Self { pipeline: Pipeline::new(fetcher) }
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        self.pipeline.source().cache()
    }

    /// Score every trajectory against nearby building footprints
    pub async fn run_exposure(
        &self,
        trajectories: Vec<Trajectory>,
        config: &ExposureConfig,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let purged = self.cache().purge_expired(config.cache_ttl());
        if purged > 0 {
            tracing::debug!(purged, "Expired footprint sets dropped before run");
        }
        self.pipeline.run(trajectories, config, cancel, progress).await
    }

    /// Retrieve the building footprints of a region
    pub async fn fetch_buildings(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        config.validate()?;
        let outcome = self.pipeline.source().fetch(region, config, cancel).await?;
        tracing::info!(
            footprints = outcome.footprints.len(),
            skipped = outcome.skipped,
            cache_hit = outcome.cache_hit,
            "Building fetch complete"
        );
        Ok(outcome)
    }
}
