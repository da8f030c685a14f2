//! Pipeline behaviour with stubbed footprint sources

use async_trait::async_trait;
use geo::polygon;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trajexp_core::config::ExposureConfig;
use trajexp_core::error::{ExposureError, Result, Stage};
use trajexp_core::models::{BoundingRegion, BuildingFootprint, GeoPoint, Trajectory};
use trajexp_core::ports::{FetchOutcome, FootprintSource, NoProgress, ProgressReporter};
use trajexp_exposure::{ExposureEngine, Pipeline, RunStatus, TrajectoryResult};
use trajexp_osm::{FetchCache, OverpassTransport, TransportError};

const M: f64 = 1.0 / 111_320.0;

fn building(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> BuildingFootprint {
    let (x0, y0, x1, y1) = (x0 * M, y0 * M, x1 * M, y1 * M);
    BuildingFootprint::new(id, polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)])
}

fn track(id: &str, lon: f64) -> Trajectory {
    Trajectory::new(id, vec![GeoPoint::new(lon, 0.0), GeoPoint::new(lon, 0.001)])
}

/// Serves the same footprints for every region and counts calls
struct StaticSource {
    footprints: Arc<Vec<BuildingFootprint>>,
    calls: AtomicUsize,
}

impl StaticSource {
    fn new(footprints: Vec<BuildingFootprint>) -> Self {
        Self { footprints: Arc::new(footprints), calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FootprintSource for StaticSource {
    async fn fetch(
        &self,
        region: &BoundingRegion,
        config: &ExposureConfig,
        _cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let area_km2 = region.area_km2();
        if area_km2 > config.max_region_area_km2 {
            return Err(ExposureError::RegionTooLarge { area_km2, max_km2: config.max_region_area_km2 });
        }
        Ok(FetchOutcome { footprints: Arc::clone(&self.footprints), skipped: 0, cache_hit: false })
    }
}

/// Waits until cancelled
struct PendingSource;

#[async_trait]
impl FootprintSource for PendingSource {
    async fn fetch(
        &self,
        _region: &BoundingRegion,
        _config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        cancel.cancelled().await;
        Err(ExposureError::Cancelled)
    }
}

/// Succeeds once, then requests cancellation on the second fetch
struct CancelOnSecondFetch {
    calls: AtomicUsize,
}

#[async_trait]
impl FootprintSource for CancelOnSecondFetch {
    async fn fetch(
        &self,
        _region: &BoundingRegion,
        _config: &ExposureConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(FetchOutcome { footprints: Arc::new(vec![]), skipped: 0, cache_hit: false });
        }
        cancel.cancel();
        Err(ExposureError::Cancelled)
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<(String, usize, usize)>>,
}

impl ProgressReporter for RecordingProgress {
    fn trajectory_finished(&self, trajectory_id: &str, completed: usize, total: usize) {
        self.events.lock().unwrap().push((trajectory_id.to_string(), completed, total));
    }
}

#[tokio::test]
async fn test_failed_trajectory_is_isolated_and_order_preserved() {
    let source = StaticSource::new(vec![building("way/1", 20.0, 50.0, 25.0, 60.0)]);
    let pipeline = Pipeline::new(source);
    let mut trajectories: Vec<Trajectory> =
        (0..5).map(|i| track(&format!("t{}", i), i as f64 * 0.01)).collect();
    trajectories[2] = Trajectory::new("t2", vec![]);

    let config = ExposureConfig { parallelism: 3, ..Default::default() };
    let report = pipeline
        .run(trajectories, &config, &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::PartiallyFailed);
    assert_eq!(report.outcomes.len(), 5);
    let ids: Vec<&str> = report.outcomes.iter().map(|o| o.trajectory_id.as_str()).collect();
    assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);

    for (i, outcome) in report.outcomes.iter().enumerate() {
        if i == 2 {
            let failure = outcome.failure().expect("t2 should fail");
            assert_eq!(failure.stage, Stage::Validate);
            assert!(matches!(failure.error, ExposureError::InsufficientPoints { count: 0 }));
        } else {
            assert!(outcome.exposure().is_some(), "trajectory {} should succeed", i);
        }
    }
    assert_eq!(report.succeeded_count(), 4);
    // The invalid trajectory never reaches the fetcher
    assert_eq!(pipeline.source().calls(), 4);
}

#[tokio::test]
async fn test_scores_match_geometry() {
    let pipeline = Pipeline::new(StaticSource::new(vec![building("way/1", 20.0, 54.6, 21.0, 56.0)]));
    let report = pipeline
        .run(vec![track("near", 0.0)], &ExposureConfig::default(), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let exposure = report.outcomes[0].exposure().unwrap();
    assert!((exposure.summary.total_exposure_score - 0.8).abs() < 0.01);
    assert_eq!(exposure.summary.contributing_footprint_ids, vec!["way/1".to_string()]);
}

#[tokio::test]
async fn test_invalid_config_aborts_before_any_fetch() {
    let pipeline = Pipeline::new(StaticSource::new(vec![]));
    let config = ExposureConfig { cutoff_distance: -1.0, ..Default::default() };

    let result = pipeline.run(vec![track("a", 0.0)], &config, &CancellationToken::new(), &NoProgress).await;
    assert!(matches!(result, Err(ExposureError::ConfigInvalid { .. })));
    assert_eq!(pipeline.source().calls(), 0);
}

#[tokio::test]
async fn test_region_too_large_fails_only_that_trajectory() {
    let pipeline = Pipeline::new(StaticSource::new(vec![]));
    let long = Trajectory::new("long", vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.5, 0.5)]);

    let report = pipeline
        .run(vec![track("short", 0.0), long], &ExposureConfig::default(), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::PartiallyFailed);
    assert!(report.outcomes[0].exposure().is_some());
    let failure = report.outcomes[1].failure().unwrap();
    assert_eq!(failure.stage, Stage::Fetch);
    assert!(matches!(failure.error, ExposureError::RegionTooLarge { .. }));
}

#[tokio::test]
async fn test_polar_trajectory_fails_projection() {
    let pipeline = Pipeline::new(StaticSource::new(vec![]));
    let polar = Trajectory::new("polar", vec![GeoPoint::new(0.0, 86.0), GeoPoint::new(0.0, 86.001)]);

    let report = pipeline
        .run(vec![polar], &ExposureConfig::default(), &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    let failure = report.outcomes[0].failure().unwrap();
    assert_eq!(failure.stage, Stage::Evaluate);
    assert!(matches!(failure.error, ExposureError::ProjectionError { .. }));
    assert_eq!(pipeline.source().calls(), 0);
}

#[tokio::test]
async fn test_batch_region_fetches_once() {
    let pipeline = Pipeline::new(StaticSource::new(vec![building("way/1", 20.0, 50.0, 25.0, 60.0)]));
    let trajectories = vec![track("a", 0.0), track("b", 0.002), Trajectory::new("c", vec![])];
    let config = ExposureConfig { batch_region: true, ..Default::default() };

    let report = pipeline
        .run(trajectories, &config, &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(pipeline.source().calls(), 1);
    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.status, RunStatus::PartiallyFailed);
}

#[tokio::test]
async fn test_cancellation_during_fetch() {
    let pipeline = Pipeline::new(PendingSource);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let trajectories = (0..4).map(|i| track(&format!("t{}", i), 0.0)).collect();
    let config = ExposureConfig { parallelism: 2, ..Default::default() };
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(trajectories, &config, &cancel, &NoProgress),
    )
    .await
    .expect("run should stop once cancelled")
    .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.cancelled_count(), 4);
}

#[tokio::test]
async fn test_cancellation_keeps_completed_results() {
    let pipeline = Pipeline::new(CancelOnSecondFetch { calls: AtomicUsize::new(0) });
    let trajectories = (0..3).map(|i| track(&format!("t{}", i), 0.0)).collect();
    let config = ExposureConfig { parallelism: 1, ..Default::default() };

    let report = pipeline
        .run(trajectories, &config, &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(matches!(report.outcomes[0].result, TrajectoryResult::Succeeded(_)));
    assert!(report.outcomes[1].is_cancelled());
    assert!(report.outcomes[2].is_cancelled());
}

/// Requests cancellation once the last trajectory has been reported
struct CancelWhenDone {
    cancel: CancellationToken,
}

impl ProgressReporter for CancelWhenDone {
    fn trajectory_finished(&self, _trajectory_id: &str, completed: usize, total: usize) {
        if completed == total {
            self.cancel.cancel();
        }
    }
}

#[tokio::test]
async fn test_cancellation_after_last_trajectory_keeps_run_completed() {
    let pipeline = Pipeline::new(StaticSource::new(vec![]));
    let cancel = CancellationToken::new();
    let progress = CancelWhenDone { cancel: cancel.clone() };
    let trajectories = (0..3).map(|i| track(&format!("t{}", i), 0.0)).collect();

    let report = pipeline.run(trajectories, &ExposureConfig::default(), &cancel, &progress).await.unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.succeeded_count(), 3);
}

#[tokio::test]
async fn test_progress_reported_per_trajectory() {
    let pipeline = Pipeline::new(StaticSource::new(vec![]));
    let progress = RecordingProgress::default();
    let trajectories = (0..3).map(|i| track(&format!("t{}", i), 0.0)).collect();

    pipeline
        .run(trajectories, &ExposureConfig::default(), &CancellationToken::new(), &progress)
        .await
        .unwrap();

    let events = progress.events.lock().unwrap();
    assert_eq!(events.len(), 3);
    let mut counts: Vec<usize> = events.iter().map(|(_, done, _)| *done).collect();
    counts.sort();
    assert_eq!(counts, vec![1, 2, 3]);
    assert!(events.iter().all(|(_, _, total)| *total == 3));
}

#[tokio::test]
async fn test_deterministic_runs() {
    let footprints = vec![
        building("way/1", 10.0, 10.0, 20.0, 20.0),
        building("way/2", -40.0, 30.0, -30.0, 45.0),
    ];
    let trajectories: Vec<Trajectory> = (0..3).map(|i| track(&format!("t{}", i), 0.0)).collect();
    let config = ExposureConfig { parallelism: 3, ..Default::default() };

    let first = Pipeline::new(StaticSource::new(footprints.clone()))
        .run(trajectories.clone(), &config, &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();
    let second = Pipeline::new(StaticSource::new(footprints))
        .run(trajectories, &config, &CancellationToken::new(), &NoProgress)
        .await
        .unwrap();

    let a: Vec<_> = first.exposures().cloned().collect();
    let b: Vec<_> = second.exposures().cloned().collect();
    assert_eq!(a, b);
}

/// Overpass transport returning one canned body
struct CannedTransport {
    body: String,
    calls: AtomicUsize,
}

#[async_trait]
impl OverpassTransport for CannedTransport {
    async fn execute(&self, _endpoint: &str, _query: &str) -> std::result::Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

#[tokio::test]
async fn test_engine_shares_cache_between_capabilities() {
    let body = r#"{"elements": [{"type": "way", "id": 5, "tags": {"building": "yes"}, "geometry": [
        {"lat": 0.0005, "lon": 0.0002}, {"lat": 0.0005, "lon": 0.0003},
        {"lat": 0.0006, "lon": 0.0003}, {"lat": 0.0006, "lon": 0.0002}, {"lat": 0.0005, "lon": 0.0002}
    ]}]}"#;
    let engine = ExposureEngine::new(
        CannedTransport { body: body.to_string(), calls: AtomicUsize::new(0) },
        Arc::new(FetchCache::new()),
    );
    let config = ExposureConfig::default();
    let cancel = CancellationToken::new();

    let region = BoundingRegion::new(-0.001, -0.001, 0.001, 0.002).unwrap();
    let fetched = engine.fetch_buildings(&region, &config, &cancel).await.unwrap();
    assert_eq!(fetched.footprints.len(), 1);
    assert!(!fetched.cache_hit);

    let report = engine.run_exposure(vec![track("t", 0.0)], &config, &cancel, &NoProgress).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    let exposure = report.outcomes[0].exposure().unwrap();
    assert_eq!(exposure.summary.contributing_footprint_ids, vec!["way/5".to_string()]);
    assert_eq!(engine.cache().len(), 1);
}

#[tokio::test]
async fn test_run_drops_expired_cache_entries() {
    let engine = ExposureEngine::new(
        CannedTransport { body: r#"{"elements": []}"#.to_string(), calls: AtomicUsize::new(0) },
        Arc::new(FetchCache::new()),
    );
    let config = ExposureConfig { fetch_cache_ttl_seconds: 0, ..Default::default() };
    let cancel = CancellationToken::new();

    let region = BoundingRegion::new(1.0, 1.0, 1.002, 1.002).unwrap();
    engine.fetch_buildings(&region, &config, &cancel).await.unwrap();
    assert_eq!(engine.cache().len(), 1);

    // A single point fails validation, so the run itself fetches nothing
    let lonely = Trajectory::new("lonely", vec![GeoPoint::new(0.0, 0.0)]);
    let report = engine.run_exposure(vec![lonely], &config, &cancel, &NoProgress).await.unwrap();
    assert_eq!(report.status, RunStatus::PartiallyFailed);
    assert!(engine.cache().is_empty());
}
