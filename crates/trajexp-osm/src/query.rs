//! Overpass QL query construction

use trajexp_core::models::BoundingRegion;

/// Overpass QL selecting building ways and multipolygon relations inside a
/// region, returned with inline geometry.
///
/// `filter` is an Overpass tag filter such as `["building"]` and is inserted
/// verbatim after each element type.
pub fn building_query(region: &BoundingRegion, filter: &str, timeout_secs: u64) -> String {
    let bbox = format!(
        "{:.7},{:.7},{:.7},{:.7}",
        region.min_lat, region.min_lon, region.max_lat, region.max_lon
    );
    format!(
        "[out:json][timeout:{timeout}];\n\
         (\n  way{filter}({bbox});\n  relation{filter}[\"type\"=\"multipolygon\"]({bbox});\n);\n\
         out geom;",
        timeout = timeout_secs,
        filter = filter.trim(),
        bbox = bbox,
    )
}
