//! Trajectory loading from GeoJSON and GPX files

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use trajexp_core::models::{GeoPoint, Trajectory};

/// Load every trajectory in a file, choosing the format by extension
pub fn load_trajectories(path: &Path) -> Result<Vec<Trajectory>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("trajectory");

    match extension.as_str() {
        "geojson" | "json" => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            from_geojson(&content, stem)
        }
        "gpx" => {
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            from_gpx(BufReader::new(file), stem)
        }
        other => bail!("unsupported file extension '{}'", other),
    }
}

/// Trajectories from LineString and MultiLineString features.
///
/// The id comes from the `id` property, then the feature id, then the file
/// stem and feature position. A `times` property holding one RFC 3339
/// timestamp per vertex attaches observation times.
pub fn from_geojson(content: &str, stem: &str) -> Result<Vec<Trajectory>> {
    let geojson: geojson::GeoJson = content.parse().context("Invalid GeoJSON")?;

    let features = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc.features,
        geojson::GeoJson::Feature(feature) => vec![feature],
        geojson::GeoJson::Geometry(geometry) => vec![geojson::Feature::from(geometry)],
    };

    let mut trajectories = Vec::new();
    for (idx, feature) in features.iter().enumerate() {
        let id = feature_id(feature).unwrap_or_else(|| format!("{}-{}", stem, idx));
        let times = feature_times(feature);

        let Some(geometry) = &feature.geometry else {
            tracing::warn!(feature = idx, "Skipping feature without geometry");
            continue;
        };

        match &geometry.value {
            geojson::Value::LineString(coords) => {
                trajectories.push(Trajectory::new(id, to_points(coords, times.as_deref())));
            }
            geojson::Value::MultiLineString(lines) => {
                for (part, coords) in lines.iter().enumerate() {
                    trajectories.push(Trajectory::new(
                        format!("{}-{}", id, part),
                        to_points(coords, None),
                    ));
                }
            }
            _ => {
                tracing::warn!(feature = idx, "Skipping non-linear feature");
            }
        }
    }

    Ok(trajectories)
}

fn feature_id(feature: &geojson::Feature) -> Option<String> {
    match feature.property("id") {
        Some(serde_json::Value::String(s)) => return Some(s.clone()),
        Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
        _ => {}
    }
    feature.id.as_ref().map(|id| match id {
        geojson::feature::Id::String(s) => s.clone(),
        geojson::feature::Id::Number(n) => n.to_string(),
    })
}

fn feature_times(feature: &geojson::Feature) -> Option<Vec<Option<DateTime<Utc>>>> {
    let values = feature.property("times")?.as_array()?;
    Some(values.iter().map(|v| v.as_str().and_then(parse_time)).collect())
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

fn to_points(coords: &[Vec<f64>], times: Option<&[Option<DateTime<Utc>>]>) -> Vec<GeoPoint> {
    let times = times.filter(|t| {
        let matches = t.len() == coords.len();
        if !matches {
            tracing::warn!(times = t.len(), points = coords.len(), "Ignoring times of mismatched length");
        }
        matches
    });

    coords
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let lon = c.first().copied().unwrap_or(f64::NAN);
            let lat = c.get(1).copied().unwrap_or(f64::NAN);
            GeoPoint { lon, lat, timestamp: times.and_then(|t| t[i]) }
        })
        .collect()
}

/// One trajectory per GPX track segment, with point times when present
pub fn from_gpx<R: std::io::Read>(reader: R, stem: &str) -> Result<Vec<Trajectory>> {
    let gpx = gpx::read(reader).context("Failed to parse GPX")?;

    let mut trajectories = Vec::new();
    for (track_idx, track) in gpx.tracks.iter().enumerate() {
        let base = track.name.clone().unwrap_or_else(|| format!("{}-{}", stem, track_idx));
        for (seg_idx, segment) in track.segments.iter().enumerate() {
            let id = if track.segments.len() == 1 { base.clone() } else { format!("{}-{}", base, seg_idx) };
            let points = segment
                .points
                .iter()
                .map(|waypoint| {
                    let point = waypoint.point();
                    let timestamp = waypoint
                        .time
                        .and_then(|t| t.format().ok())
                        .and_then(|s| parse_time(&s));
                    GeoPoint { lon: point.x(), lat: point.y(), timestamp }
                })
                .collect();
            trajectories.push(Trajectory::new(id, points));
        }
    }

    Ok(trajectories)
}
