//! Trajexp Core - Domain models, errors, and configuration
//!
//! This crate contains the domain types shared by the fetch, index, and
//! evaluation stages together with the port traits that connect them.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use config::{ExposureConfig, ScoreFunction};
pub use error::{ExposureError, Result, Stage, TrajectoryFailure};
