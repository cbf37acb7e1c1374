use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};
use crate::profile::ProfileOverrides;

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("THEMIS_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Builds profile overrides from an optional TOML profile file followed by
/// `key=value` assignments, later sources winning.
///
/// Values are read as TOML (`width=1280`, `loudness=false`, `frame_rate="30000/1001"`);
/// anything that does not parse is taken as a plain string (`video_codec=libx264`).
pub fn load_profile_overrides(
    file: Option<&Path>,
    assignments: &[String],
) -> Result<ProfileOverrides, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    for assignment in assignments {
        figment = figment.merge(Toml::string(&assignment_to_toml(assignment)?));
    }

    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn assignment_to_toml(assignment: &str) -> Result<String, ConfigError> {
    let (key, value) = assignment
        .split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| {
            ConfigError::ParseError(format!("expected KEY=VALUE, got '{}'", assignment))
        })?;

    let typed = format!("{} = {}", key, value);
    if toml::from_str::<toml::Table>(&typed).is_ok() {
        return Ok(typed);
    }
    Ok(format!(
        "{} = {}",
        key,
        toml::Value::String(value.to_string())
    ))
}
