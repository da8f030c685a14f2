//! Port trait definitions
//!
//! These traits define the interfaces that adapters must implement.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ExposureConfig;
use crate::error::Result;
use crate::models::{BoundingRegion, BuildingFootprint};

/// Footprints retrieved for a region
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub footprints: Arc<Vec<BuildingFootprint>>,

    /// Features dropped while parsing the response
    pub skipped: usize,

    /// Whether the footprints came from the cache
    pub cache_hit: bool,
}

/// Source of building footprints for a geographic region
#[async_trait]
pub trait FootprintSource: Send + Sync {
    /// Retrieve all building footprints intersecting `region`.
    ///
    /// Returns `ExposureError::Cancelled` when `cancel` fires before completion.
    async fn fetch(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome>;
}

#[async_trait]
impl<T: FootprintSource + ?Sized> FootprintSource for Arc<T> {
    async fn fetch(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        (**self).fetch(region, config, cancel).await
    }
}

/// Receives progress notifications from a pipeline run
pub trait ProgressReporter: Send + Sync {
    /// Called once per trajectory as soon as its processing ends, in completion order
    fn trajectory_finished(&self, trajectory_id: &str, completed: usize, total: usize);
}

/// Progress reporter that discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn trajectory_finished(&self, _trajectory_id: &str, _completed: usize, _total: usize) {}
}
