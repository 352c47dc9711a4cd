use crate::error::CliError;
use engine_config::ConfigSource;
use std::{fs::OpenOptions, path::Path};
use tracing::info;

/// Fails when `path` cannot be opened for writing. The file is opened in
/// append mode and left untouched.
pub fn check_writable(path: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = path {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| CliError::NotWritable {
                path: path.display().to_string(),
                source,
            })?;
    }
    Ok(())
}

/// Renders the next config and writes it to `path` when given. A `.json`
/// path gets JSON, anything else YAML.
pub async fn write_next_config(
    path: Option<&Path>,
    next_config: &ConfigSource,
) -> Result<String, CliError> {
    let is_json = path
        .and_then(|p| p.extension())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rendered = if is_json {
        next_config.to_json_pretty()?
    } else {
        next_config.to_yaml()?
    };
    if let Some(path) = path {
        tokio::fs::write(path, &rendered)
            .await
            .map_err(|source| CliError::Write {
                path: path.display().to_string(),
                source,
            })?;
        info!(path = %path.display(), "Wrote next config");
    }
    Ok(rendered)
}
