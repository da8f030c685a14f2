use crate::error::{ExposureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default Overpass API interpreter endpoint
pub const DEFAULT_OVERPASS_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Default tag filter selecting every `building=*` feature
pub const DEFAULT_BUILDING_FILTER: &str = r#"["building"]"#;

/// How a segment's distance to the nearest footprint maps to a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFunction {
    /// `max(0, 1 - distance / cutoff)`
    #[default]
    Linear,
    /// 1 inside the exposure radius, then linear decay to 0 at the cutoff
    Saturating,
}

impl ScoreFunction {
    /// Score for a distance in metres
    pub fn score(&self, distance: f64, radius: f64, cutoff: f64) -> f64 {
        if !distance.is_finite() || distance < 0.0 {
            return 0.0;
        }
        let score = match self {
            ScoreFunction::Linear => 1.0 - distance / cutoff,
            ScoreFunction::Saturating => {
                if distance <= radius {
                    1.0
                } else if radius >= cutoff {
                    0.0
                } else {
                    1.0 - (distance - radius) / (cutoff - radius)
                }
            }
        };
        score.clamp(0.0, 1.0)
    }
}

impl FromStr for ScoreFunction {
    type Err = ExposureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(ScoreFunction::Linear),
            "saturating" => Ok(ScoreFunction::Saturating),
            _ => Err(ExposureError::ConfigInvalid {
                key: "scoreFunction".to_string(),
                reason: format!("Invalid score function: {}. Use linear or saturating", s),
            }),
        }
    }
}

impl fmt::Display for ScoreFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreFunction::Linear => f.write_str("linear"),
            ScoreFunction::Saturating => f.write_str("saturating"),
        }
    }
}

/// Options recognised by the exposure pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExposureConfig {
    /// Buffer radius in metres for the contributing-footprint query
    pub exposure_radius: f64,
    /// Distance in metres at which the score reaches zero
    pub cutoff_distance: f64,
    /// Margin in metres added around each trajectory's extent before fetching
    pub region_buffer_margin: f64,
    pub max_region_area_km2: f64,
    /// Retries after the first attempt
    pub fetch_retry_count: u32,
    pub fetch_cache_ttl_seconds: u64,
    pub parallelism: usize,
    /// Segments scoring strictly above this count towards the summary
    pub exposure_threshold: f64,
    pub score_function: ScoreFunction,
    pub time_weighted: bool,
    /// Fetch one combined region for the whole batch
    pub batch_region: bool,
    /// Cache grid cell size in degrees
    pub cache_grid_resolution: f64,
    /// Minimum region width and height in degrees
    pub min_region_extent: f64,
    pub fetch_backoff_base_ms: u64,
    pub fetch_timeout_seconds: u64,
    /// Segments evaluated between cancellation checks
    pub segment_batch_size: usize,
    pub overpass_endpoint: String,
    pub building_filter: String,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            exposure_radius: 50.0,
            cutoff_distance: 100.0,
            region_buffer_margin: 100.0,
            max_region_area_km2: 25.0,
            fetch_retry_count: 3,
            fetch_cache_ttl_seconds: 3600,
            parallelism: 4,
            exposure_threshold: 0.5,
            score_function: ScoreFunction::Linear,
            time_weighted: false,
            batch_region: false,
            cache_grid_resolution: 0.01,
            min_region_extent: 0.001,
            fetch_backoff_base_ms: 500,
            fetch_timeout_seconds: 60,
            segment_batch_size: 256,
            overpass_endpoint: DEFAULT_OVERPASS_ENDPOINT.to_string(),
            building_filter: DEFAULT_BUILDING_FILTER.to_string(),
        }
    }
}

impl ExposureConfig {
    /// Reject option combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        positive("exposureRadius", self.exposure_radius)?;
        positive("cutoffDistance", self.cutoff_distance)?;
        positive("maxRegionAreaKm2", self.max_region_area_km2)?;
        positive("cacheGridResolution", self.cache_grid_resolution)?;

        if !self.region_buffer_margin.is_finite() || self.region_buffer_margin < 0.0 {
            return Err(invalid("regionBufferMargin", "must be a non-negative number of metres"));
        }
        if !self.min_region_extent.is_finite() || self.min_region_extent < 0.0 {
            return Err(invalid("minRegionExtent", "must be a non-negative number of degrees"));
        }
        if !self.exposure_threshold.is_finite() {
            return Err(invalid("exposureThreshold", "must be finite"));
        }
        if self.parallelism == 0 {
            return Err(invalid("parallelism", "must be at least 1"));
        }
        if self.segment_batch_size == 0 {
            return Err(invalid("segmentBatchSize", "must be at least 1"));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(invalid("fetchTimeoutSeconds", "must be at least 1"));
        }
        if self.overpass_endpoint.trim().is_empty() {
            return Err(ExposureError::ConfigMissing { key: "overpassEndpoint".to_string() });
        }
        if !self.building_filter.trim().starts_with('[') {
            return Err(invalid(
                "buildingFilter",
                "must be an Overpass tag filter such as [\"building\"]",
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.fetch_cache_ttl_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.fetch_backoff_base_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

fn positive(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(key, &format!("must be a positive number, got {}", value)))
    }
}

fn invalid(key: &str, reason: &str) -> ExposureError {
    ExposureError::ConfigInvalid { key: key.to_string(), reason: reason.to_string() }
}

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A set of optional overrides, as read from a file, the environment, or the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialConfig {
    pub exposure_radius: Option<f64>,
    pub cutoff_distance: Option<f64>,
    pub region_buffer_margin: Option<f64>,
    pub max_region_area_km2: Option<f64>,
    pub fetch_retry_count: Option<u32>,
    pub fetch_cache_ttl_seconds: Option<u64>,
    pub parallelism: Option<usize>,
    pub exposure_threshold: Option<f64>,
    pub score_function: Option<ScoreFunction>,
    pub time_weighted: Option<bool>,
    pub batch_region: Option<bool>,
    pub cache_grid_resolution: Option<f64>,
    pub min_region_extent: Option<f64>,
    pub fetch_backoff_base_ms: Option<u64>,
    pub fetch_timeout_seconds: Option<u64>,
    pub segment_batch_size: Option<usize>,
    pub overpass_endpoint: Option<String>,
    pub building_filter: Option<String>,
}

impl PartialConfig {
    /// Read `TRAJEXP_*` environment variables; unparsable values are logged and ignored
    pub fn from_env() -> Self {
        Self {
            exposure_radius: env_value("TRAJEXP_EXPOSURE_RADIUS"),
            cutoff_distance: env_value("TRAJEXP_CUTOFF_DISTANCE"),
            region_buffer_margin: env_value("TRAJEXP_REGION_BUFFER_MARGIN"),
            max_region_area_km2: env_value("TRAJEXP_MAX_REGION_AREA_KM2"),
            fetch_retry_count: env_value("TRAJEXP_FETCH_RETRY_COUNT"),
            fetch_cache_ttl_seconds: env_value("TRAJEXP_FETCH_CACHE_TTL_SECONDS"),
            parallelism: env_value("TRAJEXP_PARALLELISM"),
            exposure_threshold: env_value("TRAJEXP_EXPOSURE_THRESHOLD"),
            score_function: env_value("TRAJEXP_SCORE_FUNCTION"),
            time_weighted: env_value("TRAJEXP_TIME_WEIGHTED"),
            batch_region: env_value("TRAJEXP_BATCH_REGION"),
            cache_grid_resolution: env_value("TRAJEXP_CACHE_GRID_RESOLUTION"),
            min_region_extent: env_value("TRAJEXP_MIN_REGION_EXTENT"),
            fetch_backoff_base_ms: env_value("TRAJEXP_FETCH_BACKOFF_BASE_MS"),
            fetch_timeout_seconds: env_value("TRAJEXP_FETCH_TIMEOUT_SECONDS"),
            segment_batch_size: env_value("TRAJEXP_SEGMENT_BATCH_SIZE"),
            overpass_endpoint: env::var("TRAJEXP_OVERPASS_ENDPOINT").ok(),
            building_filter: env::var("TRAJEXP_BUILDING_FILTER").ok(),
        }
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': ignoring", name, raw);
            None
        }
    }
}

/// Layered configuration: defaults < file < environment < CLI
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    config: ExposureConfig,
    sources: BTreeMap<&'static str, ConfigSource>,
}

macro_rules! apply_fields {
    ($layered:ident, $partial:ident, $source:ident, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = $partial.$field {
                if $layered.outranks(stringify!($field), $source) {
                    $layered.config.$field = value;
                    $layered.sources.insert(stringify!($field), $source);
                }
            }
        )*
    };
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self { config: ExposureConfig::default(), sources: BTreeMap::new() }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ExposureError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let partial: PartialConfig =
            toml::from_str(&content).map_err(|e| ExposureError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        self.apply(partial, ConfigSource::File);
        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        self.apply(PartialConfig::from_env(), ConfigSource::Environment);
        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: PartialConfig) {
        self.apply(overrides, ConfigSource::Cli);
    }

    /// Apply overrides from `source`, keeping values set by higher-precedence sources
    pub fn apply(&mut self, partial: PartialConfig, source: ConfigSource) {
        apply_fields!(
            self,
            partial,
            source,
            [
                exposure_radius,
                cutoff_distance,
                region_buffer_margin,
                max_region_area_km2,
                fetch_retry_count,
                fetch_cache_ttl_seconds,
                parallelism,
                exposure_threshold,
                score_function,
                time_weighted,
                batch_region,
                cache_grid_resolution,
                min_region_extent,
                fetch_backoff_base_ms,
                fetch_timeout_seconds,
                segment_batch_size,
                overpass_endpoint,
                building_filter,
            ]
        );
    }

    fn outranks(&self, key: &str, source: ConfigSource) -> bool {
        source.precedence() > self.source_of(key).precedence()
    }

    /// Where the value of a snake_case option came from
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.sources.get(key).copied().unwrap_or(ConfigSource::Default)
    }

    pub fn config(&self) -> &ExposureConfig {
        &self.config
    }

    /// Validate and return the effective configuration
    pub fn resolve(self) -> Result<ExposureConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut map = BTreeMap::new();
        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&self.config) {
            for (key, value) in fields {
                let rendered = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                let source = self.source_of(&camel_to_snake(&key));
                map.insert(key, (rendered, source));
            }
        }
        map
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ExposureConfig::default();
        assert_eq!(config.exposure_radius, 50.0);
        assert_eq!(config.fetch_retry_count, 3);
        assert_eq!(config.building_filter, r#"["building"]"#);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_precedence() {
        let mut layered = LayeredConfig::with_defaults();

        layered.apply(
            PartialConfig { parallelism: Some(2), ..Default::default() },
            ConfigSource::File,
        );
        assert_eq!(layered.config().parallelism, 2);
        assert_eq!(layered.source_of("parallelism"), ConfigSource::File);

        layered.update_from_cli(PartialConfig { parallelism: Some(8), ..Default::default() });
        assert_eq!(layered.config().parallelism, 8);

        // Lower precedence should not override
        layered.apply(
            PartialConfig { parallelism: Some(1), ..Default::default() },
            ConfigSource::Environment,
        );
        assert_eq!(layered.config().parallelism, 8);
        assert_eq!(layered.source_of("parallelism"), ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
exposureRadius = 75.0
cutoffDistance = 150.0
scoreFunction = "saturating"
timeWeighted = true
"#
        )
        .unwrap();

        let layered = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();
        let config = layered.config();

        assert_eq!(config.exposure_radius, 75.0);
        assert_eq!(config.cutoff_distance, 150.0);
        assert_eq!(config.score_function, ScoreFunction::Saturating);
        assert!(config.time_weighted);
        assert_eq!(layered.source_of("exposure_radius"), ConfigSource::File);
        assert_eq!(layered.source_of("parallelism"), ConfigSource::Default);
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "exposureRadiuss = 75.0").unwrap();
        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(ExposureError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let config = ExposureConfig { parallelism: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ExposureError::ConfigInvalid { key, .. }) if key == "parallelism"));

        let config = ExposureConfig { cutoff_distance: 0.0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = ExposureConfig { exposure_radius: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());

        let config = ExposureConfig { overpass_endpoint: " ".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ExposureError::ConfigMissing { .. })));

        let config = ExposureConfig { building_filter: "building".into(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_linear_score() {
        let f = ScoreFunction::Linear;
        assert!((f.score(20.0, 50.0, 100.0) - 0.8).abs() < 1e-12);
        assert_eq!(f.score(0.0, 50.0, 100.0), 1.0);
        assert_eq!(f.score(150.0, 50.0, 100.0), 0.0);
        assert_eq!(f.score(f64::NAN, 50.0, 100.0), 0.0);
    }

    #[test]
    fn test_saturating_score() {
        let f = ScoreFunction::Saturating;
        assert_eq!(f.score(20.0, 50.0, 100.0), 1.0);
        assert!((f.score(75.0, 50.0, 100.0) - 0.5).abs() < 1e-12);
        assert_eq!(f.score(100.0, 50.0, 100.0), 0.0);
        assert_eq!(f.score(80.0, 120.0, 100.0), 1.0);
        assert_eq!(f.score(130.0, 120.0, 100.0), 0.0);
    }

    #[test]
    fn test_parse_score_function() {
        assert_eq!("LINEAR".parse::<ScoreFunction>().unwrap(), ScoreFunction::Linear);
        assert_eq!("saturating".parse::<ScoreFunction>().unwrap(), ScoreFunction::Saturating);
        assert!("cubic".parse::<ScoreFunction>().is_err());
    }

    #[test]
    fn test_inspection_map() {
        let mut layered = LayeredConfig::with_defaults();
        layered.update_from_cli(PartialConfig { exposure_radius: Some(30.0), ..Default::default() });
        let map = layered.to_inspection_map();

        let (value, source) = &map["exposureRadius"];
        assert_eq!(value, "30.0");
        assert_eq!(*source, ConfigSource::Cli);

        let (endpoint, source) = &map["overpassEndpoint"];
        assert_eq!(endpoint, DEFAULT_OVERPASS_ENDPOINT);
        assert_eq!(*source, ConfigSource::Default);
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("maxRegionAreaKm2"), "max_region_area_km2");
        assert_eq!(camel_to_snake("parallelism"), "parallelism");
    }
}
