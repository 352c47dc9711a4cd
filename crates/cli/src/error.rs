use engine_config::ConfigError;
use engine_runtime::ExecutionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Transfer failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Path '{path}' is not writable: {source}")]
    NotWritable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Shutdown requested")]
    ShutdownRequested,
}
