use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trajexp_core::config::ExposureConfig;
use trajexp_core::error::{ExposureError, Result, Stage, TrajectoryFailure};
use trajexp_core::models::{BoundingRegion, Trajectory, TrajectoryExposure};
use trajexp_core::ports::{FootprintSource, ProgressReporter};
use trajexp_geo::{Crs, SpatialIndex, SpatialIndexBuilder};

use crate::evaluator::evaluate_with_cancellation;
use crate::models::{RunReport, TrajectoryOutcome, TrajectoryResult};

/// Error tagged with the stage it occurred in
#[derive(Debug, Clone)]
struct StageError {
    stage: Stage,
    error: ExposureError,
}

fn at(stage: Stage) -> impl Fn(ExposureError) -> StageError {
    move |error| StageError { stage, error }
}

fn task_failed(stage: Stage, e: tokio::task::JoinError) -> StageError {
    StageError { stage, error: ExposureError::TaskFailed(e.to_string()) }
}

/// Index shared by every trajectory of a batch-region run
type SharedIndex = std::result::Result<Arc<SpatialIndex>, StageError>;

/// Pipeline orchestrating fetch, index, and evaluation for a batch of trajectories
pub struct Pipeline<S: FootprintSource> {
    source: S,
}

impl<S: FootprintSource> Pipeline<S> {
    /// Create a new pipeline fetching footprints from `source`
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Evaluate every trajectory.
    ///
    /// Only invalid configuration fails the whole run. Per-trajectory failures
    /// and cancellation are reported in the returned [`RunReport`], whose
    /// outcomes follow the input order.
    pub async fn run(
        &self,
        trajectories: Vec<Trajectory>,
        config: &ExposureConfig,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        config.validate()?;

        let total = trajectories.len();
        tracing::info!(
            trajectories = total,
            parallelism = config.parallelism,
            batch_region = config.batch_region,
            "Starting exposure run"
        );

        let shared = if config.batch_region {
            self.prepare_shared(&trajectories, config, cancel).await
        } else {
            None
        };

        let completed = AtomicUsize::new(0);
        let config = Arc::new(config.clone());

        let outcomes: Vec<TrajectoryOutcome> = stream::iter(trajectories)
            .map(|trajectory| {
                let config = Arc::clone(&config);
                let shared = shared.clone();
                let completed = &completed;
                async move {
                    let trajectory_id = trajectory.id.clone();
                    let result = self.process(trajectory, config, shared, cancel).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.trajectory_finished(&trajectory_id, done, total);
                    TrajectoryOutcome { trajectory_id, result }
                }
            })
            .buffered(config.parallelism)
            .collect()
            .await;

        let report = RunReport::from_outcomes(outcomes);
        tracing::info!(
            status = %report.status,
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            cancelled = report.cancelled_count(),
            "Exposure run finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        trajectory: Trajectory,
        config: Arc<ExposureConfig>,
        shared: Option<SharedIndex>,
        cancel: &CancellationToken,
    ) -> TrajectoryResult {
        if cancel.is_cancelled() {
            return TrajectoryResult::Cancelled;
        }

        let trajectory_id = trajectory.id.clone();
        match self.evaluate_one(trajectory, config, shared, cancel).await {
            Ok(exposure) => TrajectoryResult::Succeeded(exposure),
            Err(StageError { error: ExposureError::Cancelled, .. }) => TrajectoryResult::Cancelled,
            Err(StageError { stage, error }) => {
                tracing::warn!(trajectory = %trajectory_id, %stage, error = %error, "Trajectory failed");
                TrajectoryResult::Failed(TrajectoryFailure::new(trajectory_id, stage, error))
            }
        }
    }

    async fn evaluate_one(
        &self,
        trajectory: Trajectory,
        config: Arc<ExposureConfig>,
        shared: Option<SharedIndex>,
        cancel: &CancellationToken,
    ) -> std::result::Result<TrajectoryExposure, StageError> {
        trajectory.validate().map_err(at(Stage::Validate))?;

        let index = match shared {
            Some(shared) => shared?,
            None => {
                let region = BoundingRegion::from_points(
                    &trajectory.points,
                    config.region_buffer_margin,
                    config.min_region_extent,
                )
                .map_err(at(Stage::Validate))?;
                self.index_region(&region, &config, cancel).await?
            }
        };

        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            evaluate_with_cancellation(&trajectory, &index, &config, &cancel)
        })
        .await
        .map_err(|e| task_failed(Stage::Evaluate, e))?
        .map_err(at(Stage::Evaluate))
    }

    /// Fetch the footprints of `region` and index them in its planar CRS
    async fn index_region(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> std::result::Result<Arc<SpatialIndex>, StageError> {
        let crs = Crs::for_region(region).map_err(at(Stage::Evaluate))?;
        let fetched = self.source.fetch(region, config, cancel).await.map_err(at(Stage::Fetch))?;
        tracing::debug!(
            footprints = fetched.footprints.len(),
            cache_hit = fetched.cache_hit,
            crs = %crs.code(),
            "Footprints ready for indexing"
        );

        let footprints = Arc::clone(&fetched.footprints);
        let index = tokio::task::spawn_blocking(move || SpatialIndexBuilder::new(crs).build(&footprints))
            .await
            .map_err(|e| task_failed(Stage::Index, e))?
            .map_err(at(Stage::Index))?;
        Ok(Arc::new(index))
    }

    /// Build one index over the union of every valid trajectory's region
    async fn prepare_shared(
        &self,
        trajectories: &[Trajectory],
        config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Option<SharedIndex> {
        let region = trajectories
            .iter()
            .filter(|t| t.validate().is_ok())
            .filter_map(|t| {
                BoundingRegion::from_points(
                    &t.points,
                    config.region_buffer_margin,
                    config.min_region_extent,
                )
                .ok()
            })
            .reduce(|acc, r| acc.union(&r))?;

        tracing::info!(area_km2 = format!("{:.3}", region.area_km2()), "Fetching combined batch region");
        Some(self.index_region(&region, config, cancel).await)
    }
}
