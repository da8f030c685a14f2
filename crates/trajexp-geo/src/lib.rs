//! Trajexp Geo - Projection, geometry repair, and spatial indexing
//!
//! This crate handles all planar geometry: choosing a metric projection for a
//! region, repairing building polygons, and answering nearest/range queries.

pub mod index;
pub mod projection;
pub mod spatial;
pub mod validation;

pub use index::{IndexStats, IndexedFootprint, Nearest, SpatialIndex, SpatialIndexBuilder};
pub use projection::{Crs, Projector};
