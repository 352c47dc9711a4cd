use std::fmt;
use thiserror::Error;

/// Errors raised while reading, converting or validating configuration trees.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config key '{0}'")]
    Missing(String),

    #[error("Config key '{key}' expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    #[error("Config value for '{0}' is not an object")]
    NotAnObject(String),

    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Every field that failed validation, collected in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ConfigValidationError {
    pub violations: Vec<String>,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid configuration: {}", self.violations.join("; "))
    }
}
