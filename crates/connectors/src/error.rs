use engine_core::error::PluginError;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },
}

impl FileError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        FileError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<FileError> for PluginError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::InvalidFormat(msg) => PluginError::InvalidFormat(msg),
            FileError::Timestamp { .. } => PluginError::InvalidRecord(err.to_string()),
            other => PluginError::other(other),
        }
    }
}
