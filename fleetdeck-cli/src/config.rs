use anyhow::{Context, Result};
use log::{info, warn};
use shared::AppConfig;
use std::path::{Path, PathBuf};

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fleetdeck").join("config.toml"))
}

/// Load the config from `explicit`, or from the default location.
///
/// An explicit path must exist. A missing default file means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                info!("No config file found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = AppConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if !config.app.is_supported_version() {
        warn!(
            "Config version '{}' is not supported, expected '{}'",
            config.app.version,
            shared::AppSection::CURRENT_VERSION
        );
    }
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    let mut config = config.clone();
    config.app.version = shared::AppSection::CURRENT_VERSION.to_string();
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
