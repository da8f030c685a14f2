use serde::Serialize;
use tabled::Tabled;
use trajexp_core::models::{ExposureRecord, ExposureSummary};

/// Output for the run command
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub status: String,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub trajectories: Vec<TrajectoryOutput>,
    pub output_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrajectoryOutput {
    pub trajectory_id: String,
    pub status: &'static str,
    pub summary: Option<ExposureSummary>,
    /// Per-segment results, in segment order
    pub records: Option<Vec<ExposureRecord>>,
    pub error: Option<FailureOutput>,
}

#[derive(Debug, Serialize)]
pub struct FailureOutput {
    pub stage: String,
    pub message: String,
    /// Rerunning later may succeed
    pub retryable: bool,
}

/// Output for the fetch command
#[derive(Debug, Serialize)]
pub struct FetchOutput {
    pub footprints: usize,
    pub skipped: usize,
    pub cache_hit: bool,
    pub area_km2: f64,
    pub output_file: Option<String>,
}

/// Output for the config command
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub values: Vec<ConfigValue>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct ConfigValue {
    #[tabled(rename = "Option")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

/// One row of the run summary table
#[derive(Debug, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Trajectory")]
    pub trajectory: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Segments")]
    pub segments: String,
    #[tabled(rename = "Total")]
    pub total: String,
    #[tabled(rename = "Max")]
    pub max: String,
    #[tabled(rename = "Exposed")]
    pub exposed: String,
    #[tabled(rename = "Buildings")]
    pub buildings: String,
}
