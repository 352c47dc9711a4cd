use crate::{error::ConfigError, source::ConfigSource};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension (`.yml`, `.yaml`, `.json`).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yml") | Some("yaml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

pub fn parse_str(text: &str, format: ConfigFormat) -> Result<ConfigSource, ConfigError> {
    let value: Value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        ConfigFormat::Json => serde_json::from_str(text)?,
    };
    ConfigSource::from_value(value)
}

pub fn from_yaml_str(text: &str) -> Result<ConfigSource, ConfigError> {
    parse_str(text, ConfigFormat::Yaml)
}

pub fn from_json_str(text: &str) -> Result<ConfigSource, ConfigError> {
    parse_str(text, ConfigFormat::Json)
}

pub async fn load_file(path: &Path) -> Result<ConfigSource, ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
    debug!(path = %path.display(), ?format, "Loaded config file");
    parse_str(&text, format)
}
