pub mod exposure;
pub mod footprint;
pub mod region;
pub mod trajectory;

pub use exposure::{ExposureRecord, ExposureSummary, TrajectoryExposure};
pub use footprint::{BuildingFootprint, FootprintId};
pub use region::{BoundingRegion, GridKey};
pub use trajectory::{GeoPoint, Trajectory};
