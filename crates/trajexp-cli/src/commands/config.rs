//! Config command implementation

use crate::cli::ConfigArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use crate::output_types::{ConfigOutput, ConfigValue};
use anyhow::Result;
use std::path::Path;

pub fn execute(args: ConfigArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config(config_path, args.overrides.to_partial())?;

    let values: Vec<ConfigValue> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigValue { key, value, source: format!("{:?}", source) })
        .collect();

    if let Err(e) = config.config().validate() {
        output.warning(format!("Effective configuration is invalid: {}", e));
    }

    if output.is_json() {
        output.result(ConfigOutput { values })?;
    } else {
        output.section("Effective Configuration");
        output.table(values);
    }

    Ok(())
}
