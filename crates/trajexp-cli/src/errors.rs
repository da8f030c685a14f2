use console::style;
use std::fmt;
use std::path::Path;
use trajexp_core::error::ExposureError;

/// Enhanced error type with suggestions
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), context: None, suggestions: Vec::new(), help_command: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Create error for an unreadable or unsupported trajectory file
pub fn trajectory_file_unreadable(path: &Path, reason: impl fmt::Display) -> CliError {
    CliError::new("Cannot read trajectory file")
        .with_context(format!("Path: {}\nReason: {}", path.display(), reason))
        .with_suggestion("Check the file path and try again")
        .with_suggestion("Supported formats: GeoJSON LineString features (.geojson, .json) and GPX tracks (.gpx)")
        .with_help("Run: trajexp run --help")
}

/// Create error for input files that contain no trajectories
pub fn no_trajectories() -> CliError {
    CliError::new("No trajectories found")
        .with_context("None of the input files contained a LineString feature or GPX track segment.")
        .with_suggestion("Check that GeoJSON features use LineString or MultiLineString geometries")
        .with_help("Run: trajexp run --help")
}

/// Create error for a malformed --bbox argument
pub fn invalid_bbox(raw: &str, reason: impl fmt::Display) -> CliError {
    CliError::new("Invalid bounding box")
        .with_context(format!("Value: {}\nReason: {}", raw, reason))
        .with_suggestion("Use four comma-separated degrees: west,south,east,north")
        .with_suggestion("Example: --bbox 13.40,52.51,13.42,52.52")
        .with_help("Run: trajexp fetch --help")
}

/// Create error for invalid configuration
pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check trajexp.toml or the file passed with --config")
        .with_suggestion("Check TRAJEXP_* environment variables")
        .with_help("Run: trajexp config")
}

/// Map an engine error to a user-facing error with suggestions
pub fn from_exposure(error: ExposureError) -> CliError {
    match &error {
        ExposureError::ConfigInvalid { key, reason } => invalid_config(key, reason),
        ExposureError::ConfigMissing { key } => invalid_config(key, "value is required"),
        ExposureError::RegionTooLarge { max_km2, .. } => CliError::new("Region too large")
            .with_context(error.to_string())
            .with_suggestion("Request a smaller bounding box")
            .with_suggestion(format!("Or raise the limit above {} km² with --max-area", max_km2)),
        e if e.is_transient() => CliError::new("OSM endpoint unavailable")
            .with_context(error.to_string())
            .with_suggestion("Try again later or use another endpoint with --endpoint")
            .with_suggestion("Increase --retries for busy public endpoints"),
        ExposureError::QueryRejected { .. } => CliError::new("OSM query rejected")
            .with_context(error.to_string())
            .with_suggestion("Check the --filter value is a valid Overpass tag filter"),
        _ => CliError::new(error.to_string()),
    }
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let error = match error.downcast::<ExposureError>() {
        Ok(exposure) => return from_exposure(exposure),
        Err(other) => other,
    };
    let message = format!("{:#}", error);

    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check the file path and try again")
    } else if message.contains("permission denied") || message.contains("Permission denied") {
        CliError::new("Permission denied")
            .with_context(format!("Error: {}", message))
            .with_suggestion("Check file permissions")
    } else {
        CliError::new(message)
    }
}
