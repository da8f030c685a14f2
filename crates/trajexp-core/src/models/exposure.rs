use serde::Serialize;

use super::footprint::FootprintId;

/// Exposure of a single trajectory segment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureRecord {
    /// Index of the segment (segment `i` joins points `i` and `i + 1`)
    pub segment_index: usize,

    /// Planar distance in metres to the nearest footprint, `None` when no
    /// footprint exists in the index
    pub distance: Option<f64>,

    /// Footprints whose buffered geometry intersects the segment, sorted
    pub footprint_ids: Vec<FootprintId>,

    /// Unitless score in `[0, 1]`
    pub exposure_score: f64,

    /// Planar segment length in metres
    pub length_m: f64,

    /// Seconds between the segment endpoints when both are timestamped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,

    /// Set when the segment geometry could not be evaluated; the score is 0
    pub degenerate: bool,
}

/// Aggregate exposure of one trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureSummary {
    pub total_exposure_score: f64,
    pub max_single_segment_exposure: f64,
    pub segments_above_threshold: usize,
    pub contributing_footprint_ids: Vec<FootprintId>,
    pub segment_count: usize,
    pub degenerate_segment_count: usize,
    pub time_weighted: bool,
}

/// Evaluation output for one trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryExposure {
    pub trajectory_id: String,
    pub records: Vec<ExposureRecord>,
    pub summary: ExposureSummary,
}
