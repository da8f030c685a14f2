//! Error types for trajectory exposure analysis

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExposureError {
    // Fetch errors
    #[error("Region too large: {area_km2:.3} km² exceeds the configured maximum of {max_km2} km²")]
    RegionTooLarge { area_km2: f64, max_km2: f64 },

    #[error("Query rejected by OSM endpoint (HTTP {status}): {message}")]
    QueryRejected { status: u16, message: String },

    #[error("Failed to parse OSM response: {reason}")]
    ParseError { reason: String },

    #[error("OSM query failed after {attempts} attempts: {last_error}")]
    TransientExhausted { attempts: u32, last_error: String },

    // Evaluation errors
    #[error("Cannot determine a planar projection: {reason}")]
    ProjectionError { reason: String },

    #[error("Trajectory needs at least 2 points to form a segment, found {count}")]
    InsufficientPoints { count: usize },

    #[error("Invalid trajectory: {reason}")]
    InvalidTrajectory { reason: String },

    #[error("Invalid bounding region: {reason}")]
    InvalidRegion { reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Clone for ExposureError {
    fn clone(&self) -> Self {
        use ExposureError::*;
        match self {
            RegionTooLarge { area_km2, max_km2 } => {
                RegionTooLarge { area_km2: *area_km2, max_km2: *max_km2 }
            }
            QueryRejected { status, message } => {
                QueryRejected { status: *status, message: message.clone() }
            }
            ParseError { reason } => ParseError { reason: reason.clone() },
            TransientExhausted { attempts, last_error } => {
                TransientExhausted { attempts: *attempts, last_error: last_error.clone() }
            }
            ProjectionError { reason } => ProjectionError { reason: reason.clone() },
            InsufficientPoints { count } => InsufficientPoints { count: *count },
            InvalidTrajectory { reason } => InvalidTrajectory { reason: reason.clone() },
            InvalidRegion { reason } => InvalidRegion { reason: reason.clone() },
            ConfigMissing { key } => ConfigMissing { key: key.clone() },
            ConfigInvalid { key, reason } => ConfigInvalid { key: key.clone(), reason: reason.clone() },
            Cancelled => Cancelled,
            TaskFailed(message) => TaskFailed(message.clone()),
            // io::Error is not Clone; keep its kind and message
            Io(e) => Io(std::io::Error::new(e.kind(), e.to_string())),
            Serialization(message) => Serialization(message.clone()),
        }
    }
}

impl ExposureError {
    /// Whether rerunning later may succeed with the same input.
    ///
    /// Only an endpoint that stayed unavailable through every in-process
    /// retry qualifies; the other kinds fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExposureError::TransientExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExposureError>;

/// Pipeline stage in which a trajectory failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validate,
    Fetch,
    Index,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Fetch => "fetch",
            Stage::Index => "index",
            Stage::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// A failure isolated to a single trajectory of a batch.
#[derive(Debug, Clone, Error)]
#[error("Trajectory '{trajectory_id}' failed during {stage}: {error}")]
pub struct TrajectoryFailure {
    pub trajectory_id: String,
    pub stage: Stage,
    #[source]
    pub error: ExposureError,
}

impl TrajectoryFailure {
    pub fn new(trajectory_id: impl Into<String>, stage: Stage, error: ExposureError) -> Self {
        Self { trajectory_id: trajectory_id.into(), stage, error }
    }
}
