//! GeoJSON rendering of exposure results and fetched footprints

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::Serialize;
use std::fs;
use std::path::Path;
use trajexp_core::models::{BuildingFootprint, GeoPoint, Trajectory};
use trajexp_exposure::RunReport;

fn position(p: &GeoPoint) -> Vec<f64> {
    vec![p.lon, p.lat]
}

fn properties<T: Serialize>(value: &T) -> Result<JsonObject> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected an object, got {}", other),
    }
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// One LineString feature per evaluated segment plus one summary feature per
/// trajectory. `trajectories` must be the run input, in the same order.
pub fn exposure_collection(trajectories: &[Trajectory], report: &RunReport) -> Result<FeatureCollection> {
    let mut features = Vec::new();

    for (trajectory, outcome) in trajectories.iter().zip(&report.outcomes) {
        let Some(exposure) = outcome.exposure() else { continue };

        for record in &exposure.records {
            let start = &trajectory.points[record.segment_index];
            let end = &trajectory.points[record.segment_index + 1];
            let mut props = properties(record)?;
            props.insert("kind".into(), "segment".into());
            props.insert("trajectoryId".into(), exposure.trajectory_id.clone().into());
            features.push(feature(Value::LineString(vec![position(start), position(end)]), props));
        }

        let mut props = properties(&exposure.summary)?;
        props.insert("kind".into(), "summary".into());
        props.insert("trajectoryId".into(), exposure.trajectory_id.clone().into());
        let line = trajectory.points.iter().map(position).collect();
        features.push(feature(Value::LineString(line), props));
    }

    Ok(FeatureCollection { bbox: None, features, foreign_members: None })
}

/// Footprints as Polygon features carrying their source id and tags
pub fn footprint_collection(footprints: &[BuildingFootprint]) -> FeatureCollection {
    let features = footprints
        .iter()
        .map(|footprint| {
            let mut props = JsonObject::new();
            props.insert("id".into(), footprint.source_id.clone().into());
            for (key, value) in &footprint.tags {
                props.insert(key.clone(), value.clone().into());
            }
            feature(Value::from(&footprint.polygon), props)
        })
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}

pub fn to_string(collection: FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(&GeoJson::from(collection))?)
}

pub fn write(path: &Path, collection: FeatureCollection) -> Result<()> {
    fs::write(path, to_string(collection)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}
