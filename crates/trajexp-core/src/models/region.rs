use geo::{coord, GeodesicArea, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{ExposureError, Result};
use crate::models::trajectory::GeoPoint;

/// Metres per degree of latitude (mean)
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Axis-aligned geographic extent (degrees, WGS 84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Grid cell range a region snaps to; the key of the fetch cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GridKey {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BoundingRegion {
    /// Create a region, rejecting non-finite or inverted bounds
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let bounds = [min_lon, min_lat, max_lon, max_lat];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(ExposureError::InvalidRegion {
                reason: format!("bounds must be finite, got {:?}", bounds),
            });
        }
        if min_lon > max_lon || min_lat > max_lat {
            return Err(ExposureError::InvalidRegion {
                reason: format!(
                    "min must not exceed max (lon {}..{}, lat {}..{})",
                    min_lon, max_lon, min_lat, max_lat
                ),
            });
        }
        Ok(Self { min_lon, min_lat, max_lon, max_lat })
    }

    /// Smallest region covering the points, grown by `buffer_m` metres on every
    /// side and by at least `min_extent_deg` in each dimension.
    pub fn from_points(points: &[GeoPoint], buffer_m: f64, min_extent_deg: f64) -> Result<Self> {
        let first = points.first().ok_or_else(|| ExposureError::InvalidRegion {
            reason: "cannot derive a region from zero points".to_string(),
        })?;

        let mut region = Self {
            min_lon: first.lon,
            min_lat: first.lat,
            max_lon: first.lon,
            max_lat: first.lat,
        };
        for p in &points[1..] {
            region.min_lon = region.min_lon.min(p.lon);
            region.min_lat = region.min_lat.min(p.lat);
            region.max_lon = region.max_lon.max(p.lon);
            region.max_lat = region.max_lat.max(p.lat);
        }

        let region = Self::new(region.min_lon, region.min_lat, region.max_lon, region.max_lat)?;
        Ok(region.buffered(buffer_m).with_min_extent(min_extent_deg))
    }

    /// Grow the region by a margin in metres on every side
    pub fn buffered(&self, margin_m: f64) -> Self {
        if margin_m <= 0.0 {
            return *self;
        }
        let (_, center_lat) = self.center();
        let dlat = margin_m / METERS_PER_DEGREE;
        let dlon = margin_m / (METERS_PER_DEGREE * center_lat.to_radians().cos().max(0.01));
        Self {
            min_lon: (self.min_lon - dlon).max(-180.0),
            min_lat: (self.min_lat - dlat).max(-90.0),
            max_lon: (self.max_lon + dlon).min(180.0),
            max_lat: (self.max_lat + dlat).min(90.0),
        }
    }

    /// Expand degenerate dimensions symmetrically to at least `min_extent_deg`
    pub fn with_min_extent(&self, min_extent_deg: f64) -> Self {
        let mut out = *self;
        if out.width() < min_extent_deg {
            let grow = (min_extent_deg - out.width()) / 2.0;
            out.min_lon -= grow;
            out.max_lon += grow;
        }
        if out.height() < min_extent_deg {
            let grow = (min_extent_deg - out.height()) / 2.0;
            out.min_lat -= grow;
            out.max_lat += grow;
        }
        out
    }

    /// Smallest region covering both
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Centre as (lon, lat)
    pub fn center(&self) -> (f64, f64) {
        ((self.min_lon + self.max_lon) / 2.0, (self.min_lat + self.max_lat) / 2.0)
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Geodesic area in square kilometres
    pub fn area_km2(&self) -> f64 {
        self.to_rect().to_polygon().geodesic_area_unsigned() / 1_000_000.0
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Snap outward to a grid of `resolution` degrees.
    ///
    /// Returns the grid key and the snapped region, which always covers `self`.
    pub fn snap_to_grid(&self, resolution: f64) -> (GridKey, BoundingRegion) {
        let min_x = (self.min_lon / resolution).floor() as i64;
        let min_y = (self.min_lat / resolution).floor() as i64;
        let mut max_x = (self.max_lon / resolution).ceil() as i64;
        let mut max_y = (self.max_lat / resolution).ceil() as i64;
        if max_x == min_x {
            max_x += 1;
        }
        if max_y == min_y {
            max_y += 1;
        }

        let key = GridKey { min_x, min_y, max_x, max_y };
        let snapped = BoundingRegion {
            min_lon: min_x as f64 * resolution,
            min_lat: min_y as f64 * resolution,
            max_lon: max_x as f64 * resolution,
            max_lat: max_y as f64 * resolution,
        };
        (key, snapped)
    }
}
