pub mod error;
pub mod execution;

#[cfg(test)]
mod tests;

pub use error::{ExecutionError, PartialExecution, TaskError};
pub use execution::{
    executor::{ExecutionResult, TransferExecutor},
    runner::{RunOutcome, TransferRunner},
};
