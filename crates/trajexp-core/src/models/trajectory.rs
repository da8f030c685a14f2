use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExposureError, Result};

/// A geographic position (WGS 84) with an optional observation time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat, timestamp: None }
    }

    pub fn at(lon: f64, lat: f64, timestamp: DateTime<Utc>) -> Self {
        Self { lon, lat, timestamp: Some(timestamp) }
    }

    /// Whether both coordinates are finite and inside WGS 84 bounds
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// An ordered sequence of positions of one moving object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub id: String,
    pub points: Vec<GeoPoint>,
}

impl Trajectory {
    pub fn new(id: impl Into<String>, points: Vec<GeoPoint>) -> Self {
        Self { id: id.into(), points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of segments formed by consecutive points
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Check that the trajectory can be evaluated.
    ///
    /// Fails with `InsufficientPoints` when fewer than two points are present,
    /// and with `InvalidTrajectory` for out-of-range coordinates or timestamps
    /// that go backwards.
    pub fn validate(&self) -> Result<()> {
        if self.points.len() < 2 {
            return Err(ExposureError::InsufficientPoints { count: self.points.len() });
        }

        if let Some(idx) = self.points.iter().position(|p| !p.is_valid()) {
            let p = &self.points[idx];
            return Err(ExposureError::InvalidTrajectory {
                reason: format!("point {} has invalid coordinates ({}, {})", idx, p.lon, p.lat),
            });
        }

        let mut last: Option<DateTime<Utc>> = None;
        for (idx, point) in self.points.iter().enumerate() {
            if let Some(ts) = point.timestamp {
                if let Some(prev) = last {
                    if ts < prev {
                        return Err(ExposureError::InvalidTrajectory {
                            reason: format!(
                                "timestamp at point {} ({}) precedes the previous one ({})",
                                idx, ts, prev
                            ),
                        });
                    }
                }
                last = Some(ts);
            }
        }

        Ok(())
    }
}
