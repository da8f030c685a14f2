//! Overpass JSON response parsing

use geo::{Contains, Coord, LineString, Point, Polygon};
use serde::Deserialize;
use std::collections::BTreeMap;
use trajexp_core::error::{ExposureError, Result};
use trajexp_core::models::BuildingFootprint;

/// Footprints extracted from one response
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub footprints: Vec<BuildingFootprint>,

    /// Elements that were malformed or had unusable geometry
    pub skipped: usize,

    /// Server-side error reported alongside a 200 response
    pub runtime_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<serde_json::Value>,
    #[serde(default)]
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Way {
        id: i64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
        #[serde(default)]
        geometry: Vec<LatLon>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
        #[serde(default)]
        members: Vec<Member>,
    },
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<LatLon>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

/// Parse an Overpass `out geom` JSON body.
///
/// Fails with `ParseError` only when the body as a whole is unusable;
/// individual bad elements are skipped and counted.
pub fn parse_response(body: &str) -> Result<ParsedResponse> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| ExposureError::ParseError {
            reason: format!("response is not an Overpass JSON document: {}", e),
        })?;

    let mut parsed = ParsedResponse {
        runtime_error: response.remark.filter(|r| r.contains("runtime error")),
        ..Default::default()
    };

    for value in response.elements {
        let element = match serde_json::from_value::<Element>(value) {
            Ok(element) => element,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed OSM element");
                parsed.skipped += 1;
                continue;
            }
        };

        match element {
            Element::Way { id, tags, geometry } => match ring_from(&geometry) {
                Some(ring) => parsed.footprints.push(BuildingFootprint {
                    source_id: format!("way/{}", id),
                    polygon: Polygon::new(ring, vec![]),
                    tags,
                }),
                None => parsed.skipped += 1,
            },
            Element::Relation { id, tags, members } => {
                let polygons = relation_polygons(&members);
                if polygons.is_empty() {
                    parsed.skipped += 1;
                    continue;
                }
                for polygon in polygons {
                    parsed.footprints.push(BuildingFootprint {
                        source_id: format!("relation/{}", id),
                        polygon,
                        tags: tags.clone(),
                    });
                }
            }
        }
    }

    if parsed.skipped > 0 {
        tracing::warn!(skipped = parsed.skipped, "Skipped malformed OSM building features");
    }

    Ok(parsed)
}

fn to_coords(points: &[LatLon]) -> Option<Vec<Coord<f64>>> {
    points
        .iter()
        .map(|p| {
            if p.lon.is_finite() && p.lat.is_finite() {
                Some(Coord { x: p.lon, y: p.lat })
            } else {
                None
            }
        })
        .collect()
}

fn distinct_vertices(coords: &[Coord<f64>]) -> usize {
    let mut distinct: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in coords {
        if !distinct.contains(c) {
            distinct.push(*c);
        }
    }
    distinct.len()
}

/// A ring from a way's geometry, closed if needed; `None` if degenerate
fn ring_from(points: &[LatLon]) -> Option<LineString<f64>> {
    let coords = to_coords(points)?;
    if distinct_vertices(&coords) < 3 {
        return None;
    }
    let mut ring = LineString::from(coords);
    ring.close();
    Some(ring)
}

/// Join way fragments end to end into closed rings; open leftovers are dropped
fn assemble_rings(mut parts: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    parts.retain(|p| p.len() >= 2);

    while !parts.is_empty() {
        let mut current = parts.remove(0);
        while current.first() != current.last() {
            let Some(&end) = current.last() else { break };
            let next = parts.iter().position(|p| p.first() == Some(&end) || p.last() == Some(&end));
            match next {
                Some(idx) => {
                    let mut part = parts.remove(idx);
                    if part.first() != Some(&end) {
                        part.reverse();
                    }
                    current.extend(part.into_iter().skip(1));
                }
                None => break,
            }
        }

        if current.first() == current.last() && distinct_vertices(&current) >= 3 {
            rings.push(LineString::from(current));
        }
    }

    rings
}

/// Polygons of a multipolygon relation, one per outer ring, with inner rings
/// attached to the outer ring that contains them
fn relation_polygons(members: &[Member]) -> Vec<Polygon<f64>> {
    let mut outer_parts = Vec::new();
    let mut inner_parts = Vec::new();

    for member in members.iter().filter(|m| m.kind == "way") {
        let Some(coords) = to_coords(&member.geometry) else {
            continue;
        };
        match member.role.as_str() {
            "inner" => inner_parts.push(coords),
            // Untagged roles are treated as outer, as most renderers do
            _ => outer_parts.push(coords),
        }
    }

    let outers = assemble_rings(outer_parts);
    let inners = assemble_rings(inner_parts);

    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outers.len()];
    for inner in inners {
        let Some(&inner_start) = inner.0.first() else { continue };
        let owner = outers
            .iter()
            .position(|outer| Polygon::new(outer.clone(), vec![]).contains(&Point::from(inner_start)));
        if let Some(idx) = owner {
            holes[idx].push(inner);
        }
    }

    outers.into_iter().zip(holes).map(|(outer, inner)| Polygon::new(outer, inner)).collect()
}
