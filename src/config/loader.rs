//! Loading configuration from YAML

use super::schema::EngineConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Load, parse and validate a YAML configuration file
///
/// A file that cannot be read surfaces as [`Error::Io`]; parse and
/// validation failures as [`Error::ConfigError`].
///
/// # Example
///
/// ```no_run
/// use pendiente::config::load_config;
///
/// let config = load_config("engine.yaml")?;
/// let ctx = config.context;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<EngineConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref())?;

    let config = parse_config(&yaml_content)?;
    debug!("loaded config from {}", config_path.as_ref().display());
    Ok(config)
}

/// Parse and validate a YAML configuration string
pub fn parse_config(yaml: &str) -> Result<EngineConfig> {
    // An empty document means "all defaults"
    if yaml.trim().is_empty() {
        return Ok(EngineConfig::default());
    }

    let config: EngineConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&config).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(config)
}
