//! Fetch command implementation

use crate::cli::FetchArgs;
use crate::config_loader::load_config;
use crate::errors;
use crate::export;
use crate::output::OutputWriter;
use crate::output_types::FetchOutput;
use anyhow::Result;
use std::path::Path;
use trajexp_core::models::BoundingRegion;
use trajexp_exposure::ExposureEngine;

pub async fn execute(args: FetchArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let region = parse_bbox(&args.bbox)?;
    let config = load_config(config_path, args.overrides.to_partial())?
        .resolve()
        .map_err(errors::from_exposure)?;

    let engine = ExposureEngine::from_config(&config).map_err(errors::from_exposure)?;
    let cancel = super::cancel_on_interrupt();

    output.info(format!(
        "Fetching buildings for {:.3} km² from {}",
        region.area_km2(),
        config.overpass_endpoint
    ));
    let outcome = engine
        .fetch_buildings(&region, &config, &cancel)
        .await
        .map_err(errors::from_exposure)?;

    let collection = export::footprint_collection(&outcome.footprints);
    let output_file = match &args.output {
        Some(path) => {
            export::write(path, collection)?;
            Some(path.display().to_string())
        }
        None => {
            // Human mode prints the GeoJSON itself; JSON mode only reports counts
            if !output.is_json() {
                println!("{}", export::to_string(collection)?);
            }
            None
        }
    };

    if outcome.skipped > 0 {
        output.warning(format!("{} features skipped as unusable", outcome.skipped));
    }

    if output.is_json() {
        output.result(FetchOutput {
            footprints: outcome.footprints.len(),
            skipped: outcome.skipped,
            cache_hit: outcome.cache_hit,
            area_km2: region.area_km2(),
            output_file,
        })?;
    } else if let Some(file) = output_file {
        output.success(format!("Wrote {} footprints to {}", outcome.footprints.len(), file));
    }

    Ok(())
}

/// Parse `west,south,east,north` into a validated region
fn parse_bbox(raw: &str) -> Result<BoundingRegion> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| errors::invalid_bbox(raw, e))?;

    let [west, south, east, north] = values[..] else {
        return Err(errors::invalid_bbox(raw, format!("expected 4 values, got {}", values.len())).into());
    };

    BoundingRegion::new(west, south, east, north).map_err(|e| errors::invalid_bbox(raw, e).into())
}
