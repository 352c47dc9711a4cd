use engine_config::ConfigError;
use engine_core::{
    error::{PluginError, StateStoreError},
    state::ResumeState,
};
use std::fmt;
use thiserror::Error;

/// Top-level errors of a transfer.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A transaction failed before any task was launched.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("{0}")]
    Task(TaskError),

    /// Some tasks committed and some did not. The transfer can be resumed
    /// or cleaned up from the carried state.
    #[error("Transfer partially failed: {}", .0.cause)]
    PartiallyFailed(Box<PartialExecution>),

    #[error("Cleanup failed: {}", join_errors(.0))]
    Cleanup(Vec<PluginError>),

    #[error("Resume state does not match the config: {0}")]
    ResumeMismatch(String),

    #[error("Resume state error: {0}")]
    StateStore(#[from] StateStoreError),
}

/// A failed partition task. `index` is `None` when the transaction itself
/// failed after tasks had been launched.
#[derive(Debug)]
pub struct TaskError {
    pub index: Option<usize>,
    pub error: PluginError,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "task {index} failed: {}", self.error),
            None => write!(f, "transaction failed: {}", self.error),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug)]
pub struct PartialExecution {
    pub resume_state: ResumeState,
    pub cause: TaskError,
    /// Other task failures, plus failures of an automatic cleanup.
    pub suppressed: Vec<ExecutionError>,
}

impl ExecutionError {
    pub fn partial(&self) -> Option<&PartialExecution> {
        match self {
            ExecutionError::PartiallyFailed(partial) => Some(partial),
            _ => None,
        }
    }
}

fn join_errors(errors: &[PluginError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
