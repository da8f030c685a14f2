//! Planar geometric predicates used by the index and the evaluator

use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::intersects::Intersects;
use geo::{Distance, Euclidean, Line, Polygon, Rect};
use rstar::AABB;

/// Planar distance from a segment to a polygon; 0 when they touch or overlap
pub fn line_to_polygon_distance(line: &Line<f64>, polygon: &Polygon<f64>) -> f64 {
    if polygon.intersects(line) {
        return 0.0;
    }
    Euclidean.distance(line, polygon)
}

/// Bounding box of a segment grown by `margin` on every side
pub fn expanded_envelope(line: &Line<f64>, margin: f64) -> AABB<[f64; 2]> {
    let rect = line.bounding_rect();
    expand_rect(&rect, margin)
}

/// Rectangle grown by `margin` on every side, as an rstar envelope
pub fn expand_rect(rect: &Rect<f64>, margin: f64) -> AABB<[f64; 2]> {
    let min = rect.min();
    let max = rect.max();
    AABB::from_corners([min.x - margin, min.y - margin], [max.x + margin, max.y + margin])
}

/// Planar length of a segment
pub fn segment_length(line: &Line<f64>) -> f64 {
    let d = line.delta();
    d.x.hypot(d.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn test_line_distance_to_polygon() {
        let line = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 100.0 });
        let building = square(20.0, 45.0, 10.0);
        assert!((line_to_polygon_distance(&line, &building) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossing_line_has_zero_distance() {
        let line = Line::new(coord! { x: 25.0, y: 0.0 }, coord! { x: 25.0, y: 100.0 });
        assert_eq!(line_to_polygon_distance(&line, &square(20.0, 45.0, 10.0)), 0.0);
    }

    #[test]
    fn test_zero_length_segment_inside_polygon() {
        let inside = coord! { x: 25.0, y: 50.0 };
        assert_eq!(line_to_polygon_distance(&Line::new(inside, inside), &square(20.0, 45.0, 10.0)), 0.0);
        let outside = coord! { x: 0.0, y: 50.0 };
        let d = line_to_polygon_distance(&Line::new(outside, outside), &square(20.0, 45.0, 10.0));
        assert!((d - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_expanded_envelope() {
        let line = Line::new(coord! { x: 10.0, y: 5.0 }, coord! { x: 0.0, y: 0.0 });
        let envelope = expanded_envelope(&line, 2.0);
        assert_eq!(envelope.lower(), [-2.0, -2.0]);
        assert_eq!(envelope.upper(), [12.0, 7.0]);
        assert!((segment_length(&line) - 125.0f64.sqrt()).abs() < 1e-12);
    }
}
