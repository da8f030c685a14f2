use std::collections::BTreeMap;

use geo::Polygon;

/// Identifier of a footprint as reported by its source, e.g. `way/123456`
pub type FootprintId = String;

/// A building ground plan in geographic coordinates (lon, lat) plus its tags
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingFootprint {
    pub source_id: FootprintId,
    pub polygon: Polygon<f64>,
    pub tags: BTreeMap<String, String>,
}

impl BuildingFootprint {
    pub fn new(source_id: impl Into<FootprintId>, polygon: Polygon<f64>) -> Self {
        Self { source_id: source_id.into(), polygon, tags: BTreeMap::new() }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The `building` tag value (`yes`, `house`, `commercial`, ...)
    pub fn building_type(&self) -> Option<&str> {
        self.tags.get("building").map(String::as_str)
    }

    /// Height in metres from the `height` tag, if it parses
    pub fn height(&self) -> Option<f64> {
        self.tags
            .get("height")
            .and_then(|h| h.trim().trim_end_matches('m').trim().parse::<f64>().ok())
    }
}
