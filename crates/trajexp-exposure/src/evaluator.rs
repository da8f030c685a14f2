//! Per-segment exposure scoring

use geo::{Coord, Line};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use trajexp_core::config::ExposureConfig;
use trajexp_core::error::{ExposureError, Result};
use trajexp_core::models::{
    ExposureRecord, ExposureSummary, FootprintId, GeoPoint, Trajectory, TrajectoryExposure,
};
use trajexp_geo::spatial::segment_length;
use trajexp_geo::{Projector, SpatialIndex};

/// Score every segment of `trajectory` against `index`.
///
/// Geometry is evaluated in the index CRS. Fails with `InsufficientPoints`
/// for fewer than two points and `ProjectionError` when the index CRS cannot
/// be instantiated; segments that cannot be measured are recorded as
/// degenerate with a score of 0.
pub fn evaluate(
    trajectory: &Trajectory,
    index: &SpatialIndex,
    config: &ExposureConfig,
) -> Result<TrajectoryExposure> {
    evaluate_with_cancellation(trajectory, index, config, &CancellationToken::new())
}

/// [`evaluate`], checking `cancel` every `segment_batch_size` segments
pub fn evaluate_with_cancellation(
    trajectory: &Trajectory,
    index: &SpatialIndex,
    config: &ExposureConfig,
    cancel: &CancellationToken,
) -> Result<TrajectoryExposure> {
    trajectory.validate()?;

    let projector = Projector::new(index.crs())?;
    let projected: Vec<Option<Coord<f64>>> = trajectory
        .points
        .iter()
        .enumerate()
        .map(|(idx, p)| match projector.project(p.lon, p.lat) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::debug!(trajectory = %trajectory.id, point = idx, error = %e, "point not projectable");
                None
            }
        })
        .collect();

    let batch = config.segment_batch_size.max(1);
    let mut records = Vec::with_capacity(trajectory.segment_count());

    for (idx, pair) in trajectory.points.windows(2).enumerate() {
        if idx % batch == 0 && cancel.is_cancelled() {
            return Err(ExposureError::Cancelled);
        }
        let duration_s = segment_duration(&pair[0], &pair[1]);
        let record = match (projected[idx], projected[idx + 1]) {
            (Some(start), Some(end)) => {
                score_segment(idx, Line::new(start, end), duration_s, index, config)
            }
            _ => degenerate(idx, duration_s),
        };
        records.push(record);
    }

    let summary = summarize(&records, config);
    if summary.degenerate_segment_count > 0 {
        tracing::warn!(
            trajectory = %trajectory.id,
            degenerate = summary.degenerate_segment_count,
            "Segments could not be evaluated and were scored 0"
        );
    }
    tracing::debug!(
        trajectory = %trajectory.id,
        segments = summary.segment_count,
        total = summary.total_exposure_score,
        "Trajectory evaluated"
    );

    Ok(TrajectoryExposure { trajectory_id: trajectory.id.clone(), records, summary })
}

fn score_segment(
    segment_index: usize,
    line: Line<f64>,
    duration_s: Option<f64>,
    index: &SpatialIndex,
    config: &ExposureConfig,
) -> ExposureRecord {
    let length_m = segment_length(&line);
    let distance = index.nearest_to_line(&line).map(|n| n.distance);

    if !length_m.is_finite() || distance.is_some_and(|d| !d.is_finite()) {
        return degenerate(segment_index, duration_s);
    }

    let mut footprint_ids: Vec<FootprintId> = index
        .near_line(&line, config.exposure_radius)
        .into_iter()
        .map(|f| f.source_id.clone())
        .collect();
    footprint_ids.sort();
    footprint_ids.dedup();

    let exposure_score = distance
        .map(|d| config.score_function.score(d, config.exposure_radius, config.cutoff_distance))
        .unwrap_or(0.0);

    ExposureRecord {
        segment_index,
        distance,
        footprint_ids,
        exposure_score,
        length_m,
        duration_s,
        degenerate: false,
    }
}

fn degenerate(segment_index: usize, duration_s: Option<f64>) -> ExposureRecord {
    ExposureRecord {
        segment_index,
        distance: None,
        footprint_ids: Vec::new(),
        exposure_score: 0.0,
        length_m: 0.0,
        duration_s,
        degenerate: true,
    }
}

/// Seconds between two timestamped points
fn segment_duration(start: &GeoPoint, end: &GeoPoint) -> Option<f64> {
    let (a, b) = (start.timestamp?, end.timestamp?);
    Some((b - a).num_milliseconds() as f64 / 1000.0)
}

/// Aggregate segment records into a trajectory summary
pub fn summarize(records: &[ExposureRecord], config: &ExposureConfig) -> ExposureSummary {
    let mut contributing: BTreeSet<&FootprintId> = BTreeSet::new();
    let mut total = 0.0;
    let mut max: f64 = 0.0;
    let mut above = 0;

    for record in records {
        total += match (config.time_weighted, record.duration_s) {
            (true, Some(seconds)) => record.exposure_score * seconds,
            _ => record.exposure_score,
        };
        max = max.max(record.exposure_score);
        if record.exposure_score > config.exposure_threshold {
            above += 1;
        }
        contributing.extend(record.footprint_ids.iter());
    }

    ExposureSummary {
        total_exposure_score: total,
        max_single_segment_exposure: max,
        segments_above_threshold: above,
        contributing_footprint_ids: contributing.into_iter().cloned().collect(),
        segment_count: records.len(),
        degenerate_segment_count: records.iter().filter(|r| r.degenerate).count(),
        time_weighted: config.time_weighted,
    }
}
