use serde::Serialize;
use trajexp_core::error::TrajectoryFailure;
use trajexp_core::models::TrajectoryExposure;

/// Overall status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Every trajectory was evaluated
    Completed,
    /// At least one trajectory was cut short by cancellation
    Cancelled,
    /// At least one trajectory failed; the others were evaluated
    PartiallyFailed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Cancelled => write!(f, "Cancelled"),
            RunStatus::PartiallyFailed => write!(f, "PartiallyFailed"),
        }
    }
}

/// What happened to one trajectory
#[derive(Debug, Clone)]
pub enum TrajectoryResult {
    Succeeded(TrajectoryExposure),
    Failed(TrajectoryFailure),
    /// Not completed before cancellation
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TrajectoryOutcome {
    pub trajectory_id: String,
    pub result: TrajectoryResult,
}

impl TrajectoryOutcome {
    pub fn exposure(&self) -> Option<&TrajectoryExposure> {
        match &self.result {
            TrajectoryResult::Succeeded(exposure) => Some(exposure),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&TrajectoryFailure> {
        match &self.result {
            TrajectoryResult::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.result, TrajectoryResult::Cancelled)
    }
}

/// Result of a pipeline run, one outcome per input trajectory in input order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub outcomes: Vec<TrajectoryOutcome>,
}

impl RunReport {
    /// Derive the run status from the outcomes alone, so a cancellation that
    /// arrives after every trajectory finished leaves the run `Completed`
    pub fn from_outcomes(outcomes: Vec<TrajectoryOutcome>) -> Self {
        let status = if outcomes.iter().any(|o| o.is_cancelled()) {
            RunStatus::Cancelled
        } else if outcomes.iter().any(|o| o.failure().is_some()) {
            RunStatus::PartiallyFailed
        } else {
            RunStatus::Completed
        };
        Self { status, outcomes }
    }

    pub fn exposures(&self) -> impl Iterator<Item = &TrajectoryExposure> {
        self.outcomes.iter().filter_map(|o| o.exposure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TrajectoryFailure> {
        self.outcomes.iter().filter_map(|o| o.failure())
    }

    pub fn succeeded_count(&self) -> usize {
        self.exposures().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_cancelled()).count()
    }
}
