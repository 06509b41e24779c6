//! Configuration file loader for the `.sas/` directory.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use sas_protocol::GlobalConfig;
use std::path::Path;

/// Loads configuration from `<root>/.sas/config.toml`.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.sas/` folder
///
/// # Returns
///
/// An `AppConfig` rooted at `root`. A missing `.sas/` directory or a missing
/// `config.toml` yields the default configuration rather than an error;
/// missing keys take their defaults.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `config.toml` exists but cannot be read
/// - `config.toml` has invalid TOML syntax or wrongly typed values
/// - a slot capacity is zero or the extraction model is blank
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let sas_dir = root.join(".sas");

    if !sas_dir.exists() {
        return Ok(AppConfig::new(root, GlobalConfig::default()));
    }

    let global = load_global_config(&sas_dir)?;
    Ok(AppConfig::new(root, global))
}

/// Loads global configuration from `config.toml`.
fn load_global_config(sas_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = sas_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate(&config).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path,
        reason,
    })?;

    Ok(config)
}

fn validate(config: &GlobalConfig) -> Result<(), String> {
    let params = &config.parameters;
    for (name, count) in [
        ("point_slots", params.point_slots),
        ("number_slots", params.number_slots),
        ("flag_slots", params.flag_slots),
    ] {
        if count == 0 {
            return Err(format!("parameters.{name} must be at least 1"));
        }
    }

    if config.extraction.model.trim().is_empty() {
        return Err("extraction.model must not be empty".to_string());
    }

    Ok(())
}
