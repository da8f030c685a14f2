//! Trajexp Exposure - Segment scoring and the batch pipeline
//!
//! This crate evaluates trajectories against a spatial index of building
//! footprints and orchestrates fetch, index, and evaluation across a batch.

pub mod engine;
pub mod evaluator;
pub mod models;
pub mod pipeline;

pub use engine::ExposureEngine;
pub use evaluator::{evaluate, evaluate_with_cancellation};
pub use models::{RunReport, RunStatus, TrajectoryOutcome, TrajectoryResult};
pub use pipeline::Pipeline;
