use crate::projection::{Crs, Projector};
use crate::spatial::{expand_rect, expanded_envelope, line_to_polygon_distance};
use crate::validation::{repair_polygon, Repair};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::intersects::Intersects;
use geo::{Coord, Line, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use std::cmp::Ordering;
use trajexp_core::error::Result;
use trajexp_core::models::{BuildingFootprint, FootprintId};

/// Initial search margin in metres for nearest queries
const SEED_SEARCH_RADIUS: f64 = 16.0;

/// Beyond this margin a nearest query falls back to a full scan
const MAX_SEARCH_RADIUS: f64 = 1.0e7;

/// Projected footprint stored in the R-tree
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFootprint {
    /// Position of the footprint in the input set
    pub slot: usize,

    pub source_id: FootprintId,

    /// Polygon in the index CRS
    pub polygon: Polygon<f64>,

    envelope: AABB<[f64; 2]>,
}

impl IndexedFootprint {
    fn new(slot: usize, source_id: FootprintId, polygon: Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        let envelope = expand_rect(&rect, 0.0);
        Some(Self { slot, source_id, polygon, envelope })
    }
}

impl RTreeObject for IndexedFootprint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Result of a nearest-footprint query
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a> {
    pub footprint: &'a IndexedFootprint,
    pub distance: f64,
}

/// Counts gathered while building an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub input: usize,
    pub indexed: usize,
    pub repaired: usize,
    pub excluded: usize,
}

/// Spatial index over projected building footprints
pub struct SpatialIndex {
    tree: RTree<IndexedFootprint>,
    crs: Crs,
    stats: IndexStats,
}

impl SpatialIndex {
    /// CRS of every geometry stored in (and passed to) this index
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Get the total number of footprints in the index
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    fn candidates(&self, envelope: &AABB<[f64; 2]>) -> Vec<&IndexedFootprint> {
        self.tree.locate_in_envelope_intersecting(envelope).collect()
    }

    fn closest<'a>(
        line: &Line<f64>,
        candidates: impl IntoIterator<Item = &'a IndexedFootprint>,
    ) -> Option<Nearest<'a>> {
        candidates
            .into_iter()
            .map(|footprint| Nearest {
                footprint,
                distance: line_to_polygon_distance(line, &footprint.polygon),
            })
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(Ordering::Equal)
                    .then(a.footprint.slot.cmp(&b.footprint.slot))
            })
    }

    /// Footprint closest to a segment, with its exact planar distance.
    ///
    /// Ties are broken by input position so repeated queries agree.
    pub fn nearest_to_line(&self, line: &Line<f64>) -> Option<Nearest<'_>> {
        if self.is_empty() {
            return None;
        }

        let mut radius = SEED_SEARCH_RADIUS;
        while radius <= MAX_SEARCH_RADIUS {
            let found = Self::closest(line, self.candidates(&expanded_envelope(line, radius)));
            if let Some(best) = found {
                if best.distance <= radius {
                    return Some(best);
                }
                // Something closer may sit outside the first search box
                return Self::closest(
                    line,
                    self.candidates(&expanded_envelope(line, best.distance)),
                );
            }
            radius *= 4.0;
        }

        Self::closest(line, self.tree.iter())
    }

    /// Footprint closest to a point
    pub fn nearest_to_point(&self, point: Coord<f64>) -> Option<Nearest<'_>> {
        self.nearest_to_line(&Line::new(point, point))
    }

    /// Footprints whose geometry lies within `radius` of the segment
    pub fn near_line(&self, line: &Line<f64>, radius: f64) -> Vec<&IndexedFootprint> {
        self.candidates(&expanded_envelope(line, radius))
            .into_iter()
            .filter(|f| line_to_polygon_distance(line, &f.polygon) <= radius)
            .collect()
    }

    /// Footprints intersecting the circle of `radius` around a point
    pub fn within_radius(&self, center: Coord<f64>, radius: f64) -> Vec<&IndexedFootprint> {
        self.near_line(&Line::new(center, center), radius)
    }

    /// Footprints intersecting a polygonal buffer
    pub fn intersecting(&self, area: &Polygon<f64>) -> Vec<&IndexedFootprint> {
        let Some(rect) = area.bounding_rect() else {
            return Vec::new();
        };
        self.candidates(&expand_rect(&rect, 0.0))
            .into_iter()
            .filter(|f| f.polygon.intersects(area))
            .collect()
    }

    /// Iterate every indexed footprint in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &IndexedFootprint> {
        self.tree.iter()
    }
}

/// Builds a [`SpatialIndex`] from geographic footprints
pub struct SpatialIndexBuilder {
    crs: Crs,
}

impl SpatialIndexBuilder {
    /// Builder projecting into `crs`
    pub fn new(crs: Crs) -> Self {
        Self { crs }
    }

    /// Project, repair, and bulk-load the footprints.
    ///
    /// Fails only when the projection itself cannot be created; individual
    /// footprints that cannot be projected or repaired are excluded and counted.
    pub fn build(self, footprints: &[BuildingFootprint]) -> Result<SpatialIndex> {
        let projector = Projector::new(&self.crs)?;
        let mut stats = IndexStats { input: footprints.len(), ..Default::default() };
        let mut indexed = Vec::with_capacity(footprints.len());

        for (slot, footprint) in footprints.iter().enumerate() {
            let projected = match projector.project_polygon(&footprint.polygon) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(id = %footprint.source_id, error = %e, "footprint not projectable");
                    stats.excluded += 1;
                    continue;
                }
            };

            let polygon = match repair_polygon(&projected) {
                Repair::Valid(p) => p,
                Repair::Repaired(p, reason) => {
                    tracing::debug!(id = %footprint.source_id, ?reason, "footprint repaired");
                    stats.repaired += 1;
                    p
                }
                Repair::Excluded(reason) => {
                    tracing::debug!(id = %footprint.source_id, ?reason, "footprint excluded");
                    stats.excluded += 1;
                    continue;
                }
            };

            match IndexedFootprint::new(slot, footprint.source_id.clone(), polygon) {
                Some(entry) => indexed.push(entry),
                None => stats.excluded += 1,
            }
        }

        stats.indexed = indexed.len();
        if stats.excluded > 0 || stats.repaired > 0 {
            tracing::warn!(
                excluded = stats.excluded,
                repaired = stats.repaired,
                "Invalid footprint geometries encountered while building index"
            );
        }
        tracing::debug!(crs = %self.crs.code(), indexed = stats.indexed, "Spatial index built");

        Ok(SpatialIndex { tree: RTree::bulk_load(indexed), crs: self.crs, stats })
    }
}
