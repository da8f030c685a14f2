use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trajexp_core::config::{PartialConfig, ScoreFunction};

/// Trajexp - Trajectory exposure to building footprints
#[derive(Parser, Debug)]
#[command(name = "trajexp")]
#[command(about = "Score trajectories by their proximity to OpenStreetMap buildings", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (TOML); defaults to ./trajexp.toml when present
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate trajectories from GeoJSON or GPX files
    Run(RunArgs),

    /// Download building footprints for a bounding box
    Fetch(FetchArgs),

    /// Show the effective configuration and where each value comes from
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Trajectory files (.geojson, .json, or .gpx)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Write segment records and summaries as a GeoJSON FeatureCollection
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrideArgs,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Bounding box as west,south,east,north in degrees
    #[arg(long, value_name = "W,S,E,N", allow_hyphen_values = true)]
    pub bbox: String,

    /// Write footprints to this GeoJSON file instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrideArgs,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrideArgs,
}

/// Per-invocation overrides; they take precedence over file and environment
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrideArgs {
    /// Buffer radius in metres for contributing footprints
    #[arg(long, value_name = "METRES")]
    pub radius: Option<f64>,

    /// Distance in metres at which the score reaches zero
    #[arg(long, value_name = "METRES")]
    pub cutoff: Option<f64>,

    /// Margin in metres added around each trajectory before fetching
    #[arg(long, value_name = "METRES")]
    pub buffer: Option<f64>,

    /// Largest region in km² a single query may cover
    #[arg(long, value_name = "KM2")]
    pub max_area: Option<f64>,

    /// Retries after the first failed attempt
    #[arg(long)]
    pub retries: Option<u32>,

    /// Lifetime of cached footprints in seconds
    #[arg(long, value_name = "SECONDS")]
    pub cache_ttl: Option<u64>,

    /// Trajectories processed concurrently
    #[arg(long, short = 'j')]
    pub parallelism: Option<usize>,

    /// Segment score above which a segment counts as exposed
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Distance-to-score mapping (linear or saturating)
    #[arg(long)]
    pub score_function: Option<ScoreFunction>,

    /// Weight segment scores by their duration in seconds
    #[arg(long)]
    pub time_weighted: bool,

    /// Fetch one combined region for all trajectories
    #[arg(long)]
    pub batch_region: bool,

    /// Overpass API interpreter URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Overpass tag filter, e.g. '["building"]'
    #[arg(long)]
    pub filter: Option<String>,
}

impl ConfigOverrideArgs {
    pub fn to_partial(&self) -> PartialConfig {
        PartialConfig {
            exposure_radius: self.radius,
            cutoff_distance: self.cutoff,
            region_buffer_margin: self.buffer,
            max_region_area_km2: self.max_area,
            fetch_retry_count: self.retries,
            fetch_cache_ttl_seconds: self.cache_ttl,
            parallelism: self.parallelism,
            exposure_threshold: self.threshold,
            score_function: self.score_function,
            time_weighted: self.time_weighted.then_some(true),
            batch_region: self.batch_region.then_some(true),
            overpass_endpoint: self.endpoint.clone(),
            building_filter: self.filter.clone(),
            ..Default::default()
        }
    }
}
