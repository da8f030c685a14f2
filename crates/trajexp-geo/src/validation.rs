use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, ConvexHull, LineString, Polygon, RemoveRepeatedPoints};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub location: String,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    NonFinite,
    TooFewPoints,
    SelfIntersection,
    ZeroArea,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, kind: ValidationErrorKind) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, kind });
    }

    pub fn has(&self, kind: ValidationErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

/// Outcome of repairing a footprint polygon
#[derive(Debug, Clone, PartialEq)]
pub enum Repair {
    /// Already valid
    Valid(Polygon<f64>),
    /// Fixed, with the reason it needed fixing
    Repaired(Polygon<f64>, ValidationErrorKind),
    /// Beyond repair
    Excluded(ValidationErrorKind),
}

/// Validate a polygon ring by ring
pub fn validate_polygon(polygon: &Polygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();
    validate_ring(polygon.exterior(), "exterior", &mut result);
    for (i, interior) in polygon.interiors().iter().enumerate() {
        validate_ring(interior, &format!("interior[{}]", i), &mut result);
    }
    if result.is_valid && polygon.unsigned_area() <= 0.0 {
        result.add_error("exterior".to_string(), ValidationErrorKind::ZeroArea);
    }
    result
}

fn validate_ring(ring: &LineString<f64>, location: &str, result: &mut ValidationResult) {
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        result.add_error(location.to_string(), ValidationErrorKind::NonFinite);
        return;
    }
    // A closed ring needs 3 distinct vertices plus the closing one
    if ring.0.len() < 4 {
        result.add_error(location.to_string(), ValidationErrorKind::TooFewPoints);
        return;
    }
    if ring_self_intersects(ring) {
        result.add_error(location.to_string(), ValidationErrorKind::SelfIntersection);
    }
}

/// Whether any two non-adjacent edges of a closed ring touch, or adjacent
/// edges fold back over each other
pub fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let edges: Vec<_> = ring.lines().collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::Collinear { .. }) => return true,
                Some(LineIntersection::SinglePoint { .. }) if !adjacent => return true,
                Some(LineIntersection::SinglePoint { .. }) => {}
            }
        }
    }
    false
}

/// Repair a footprint polygon where feasible.
///
/// Repeated vertices are dropped and degenerate holes removed. A
/// self-intersecting exterior is replaced by its convex hull. Polygons with
/// non-finite coordinates or no area are excluded.
pub fn repair_polygon(polygon: &Polygon<f64>) -> Repair {
    let original = validate_polygon(polygon);
    if original.is_valid {
        return Repair::Valid(polygon.clone());
    }
    if original.has(ValidationErrorKind::NonFinite) {
        return Repair::Excluded(ValidationErrorKind::NonFinite);
    }

    let cleaned = polygon.remove_repeated_points();
    let exterior = cleaned.exterior().clone();
    if exterior.0.len() < 4 {
        return Repair::Excluded(ValidationErrorKind::TooFewPoints);
    }

    let interiors: Vec<LineString<f64>> = cleaned
        .interiors()
        .iter()
        .filter(|ring| ring.0.len() >= 4 && !ring_self_intersects(ring))
        .cloned()
        .collect();

    let reason = original.errors.first().map(|e| e.kind).unwrap_or(ValidationErrorKind::ZeroArea);
    let candidate = if ring_self_intersects(&exterior) {
        Polygon::new(exterior, vec![]).convex_hull()
    } else {
        Polygon::new(exterior, interiors)
    };

    let check = validate_polygon(&candidate);
    if check.is_valid {
        Repair::Repaired(candidate, reason)
    } else {
        Repair::Excluded(check.errors.first().map(|e| e.kind).unwrap_or(reason))
    }
}
