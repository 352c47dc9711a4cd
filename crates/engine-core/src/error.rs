use engine_config::ConfigError;
use model::error::{PageError, SchemaError};
use thiserror::Error;

/// Runtime error raised by a plugin while running a transaction or a task.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("{failed} of {total} tasks failed")]
    TasksFailed { failed: usize, total: usize },

    #[error("Task was cancelled before it started")]
    Cancelled,

    #[error("Unknown {kind} plugin '{name}'")]
    UnknownPlugin { kind: &'static str, name: String },

    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PluginError {
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        PluginError::Other(err.into())
    }
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Failed to access resume state at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode resume state: {0}")]
    Serialization(#[from] serde_yaml::Error),
}
