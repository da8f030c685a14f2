use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trajexp_core::config::ExposureConfig;
use trajexp_core::error::{ExposureError, Result};
use trajexp_core::models::BoundingRegion;
use trajexp_core::ports::{FetchOutcome, FootprintSource};

use crate::cache::{CacheKey, FetchCache};
use crate::parse::{parse_response, ParsedResponse};
use crate::query::building_query;
use crate::transport::{OverpassTransport, TransportError};

/// Upper bound for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Longest response excerpt carried in a `QueryRejected` error
const MAX_ERROR_BODY: usize = 512;

/// Retrieves building footprints for regions, consulting a shared cache first
pub struct FootprintFetcher<T: OverpassTransport> {
    transport: T,
    cache: Arc<FetchCache>,
}

impl<T: OverpassTransport> FootprintFetcher<T> {
    pub fn new(transport: T, cache: Arc<FetchCache>) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    /// Fetch all building footprints for `region`.
    ///
    /// The query covers `region` snapped outward to the cache grid so the
    /// cached set serves every region that maps to the same cells.
    pub async fn fetch(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let area_km2 = region.area_km2();
        if area_km2 > config.max_region_area_km2 {
            return Err(ExposureError::RegionTooLarge {
                area_km2,
                max_km2: config.max_region_area_km2,
            });
        }

        let (cells, snapped) = region.snap_to_grid(config.cache_grid_resolution);
        let key = CacheKey::new(cells, config.overpass_endpoint.trim(), config.building_filter.trim());

        if let Some(footprints) = self.cache.get(&key, config.cache_ttl()) {
            tracing::debug!(?cells, count = footprints.len(), "Footprint cache hit");
            return Ok(FetchOutcome { footprints, skipped: 0, cache_hit: true });
        }

        let query =
            building_query(&snapped, &config.building_filter, config.fetch_timeout_seconds);
        let parsed = self.query_with_retry(&query, config, cancel).await?;

        tracing::info!(
            count = parsed.footprints.len(),
            skipped = parsed.skipped,
            area_km2 = format!("{:.3}", snapped.area_km2()),
            "Fetched building footprints"
        );

        let footprints = self.cache.insert(key, parsed.footprints, config.cache_ttl());
        Ok(FetchOutcome { footprints, skipped: parsed.skipped, cache_hit: false })
    }

    async fn query_with_retry(
        &self,
        query: &str,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<ParsedResponse> {
        let attempts = config.fetch_retry_count.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExposureError::Cancelled),
                result = self.transport.execute(&config.overpass_endpoint, query) => result,
            };

            match result {
                Ok(body) => {
                    let parsed = parse_response(&body)?;
                    match &parsed.runtime_error {
                        None => return Ok(parsed),
                        Some(remark) => last_error = remark.clone(),
                    }
                }
                Err(e) if e.is_transient() => last_error = e.to_string(),
                Err(TransportError::Status { status, body }) => {
                    return Err(ExposureError::QueryRejected {
                        status,
                        message: excerpt(&body),
                    });
                }
                Err(e) => {
                    return Err(ExposureError::QueryRejected { status: 0, message: e.to_string() });
                }
            }

            tracing::warn!(attempt, attempts, error = %last_error, "Transient OSM query failure");

            if attempt < attempts {
                let delay = backoff_delay(config.backoff_base(), attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ExposureError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(ExposureError::TransientExhausted { attempts, last_error })
    }
}

#[async_trait]
impl<T: OverpassTransport> FootprintSource for FootprintFetcher<T> {
    async fn fetch(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        FootprintFetcher::fetch(self, region, config, cancel).await
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
