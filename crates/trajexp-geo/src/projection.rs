//! Planar projection of geographic coordinates

use geo::{Coord, LineString, Polygon};
use proj::Proj;
use serde::{Deserialize, Serialize};
use trajexp_core::error::{ExposureError, Result};
use trajexp_core::models::BoundingRegion;

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// WGS 84 / UTM zone (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Self {
        let (base, hemisphere) = if north { (32600, 'N') } else { (32700, 'S') };
        Self::new(base + zone, format!("WGS 84 / UTM zone {}{}", zone, hemisphere))
    }

    /// UTM zone containing a position.
    ///
    /// UTM is undefined poleward of 84°N and 80°S; those positions fail with
    /// `ProjectionError`.
    pub fn utm_for(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ExposureError::ProjectionError {
                reason: format!("non-finite position ({}, {})", lon, lat),
            });
        }
        if !(-80.0..=84.0).contains(&lat) {
            return Err(ExposureError::ProjectionError {
                reason: format!("latitude {} is outside the UTM coverage of -80..84", lat),
            });
        }
        let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32;
        Ok(Self::utm(zone, lat >= 0.0))
    }

    /// Metric CRS for a region, chosen from its centre
    pub fn for_region(region: &BoundingRegion) -> Result<Self> {
        let (lon, lat) = region.center();
        Self::utm_for(lon, lat)
    }

    pub fn code(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

/// Converts WGS 84 geometries into a planar CRS
pub struct Projector {
    proj: Proj,
    target: Crs,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector").field("target", &self.target).finish()
    }
}

impl Projector {
    /// Create a projection from WGS 84 (lon, lat order) to `target`
    pub fn new(target: &Crs) -> Result<Self> {
        let from = Crs::wgs84().code();
        let to = target.code();
        let proj = Proj::new_known_crs(&from, &to, None).map_err(|e| {
            ExposureError::ProjectionError {
                reason: format!("Failed to create projection from {} to {}: {}", from, to, e),
            }
        })?;
        Ok(Self { proj, target: target.clone() })
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Project a single (lon, lat) position
    pub fn project(&self, lon: f64, lat: f64) -> Result<Coord<f64>> {
        let (x, y) = self.proj.convert((lon, lat)).map_err(|e| ExposureError::ProjectionError {
            reason: format!("Projection of ({}, {}) failed: {}", lon, lat, e),
        })?;
        if !x.is_finite() || !y.is_finite() {
            return Err(ExposureError::ProjectionError {
                reason: format!("Projection of ({}, {}) is not finite", lon, lat),
            });
        }
        Ok(Coord { x, y })
    }

    pub fn project_line_string(&self, line: &LineString<f64>) -> Result<LineString<f64>> {
        let coords: Result<Vec<_>> = line.0.iter().map(|c| self.project(c.x, c.y)).collect();
        Ok(LineString::from(coords?))
    }

    pub fn project_polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        let exterior = self.project_line_string(polygon.exterior())?;
        let interiors: Result<Vec<_>> =
            polygon.interiors().iter().map(|ring| self.project_line_string(ring)).collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}
