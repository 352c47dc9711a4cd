use crate::{
    error::ExecutionError,
    execution::executor::{ExecutionResult, TransferExecutor},
};
use engine_config::{ConfigError, ConfigSource};
use engine_core::state::ResumeStateStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A committed transfer and the config the next run should start from.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: ExecutionResult,
    pub next_config: ConfigSource,
    pub resumed: bool,
}

/// Decides between run and resume, and what happens to the resume state
/// when a transfer does not commit.
///
/// With a store, a partial failure is persisted and left for a later run or
/// an explicit cleanup. Without one, the committed tasks are cleaned up
/// right away and the original error is returned.
pub struct TransferRunner {
    executor: TransferExecutor,
    store: Option<Arc<dyn ResumeStateStore>>,
}

impl TransferRunner {
    pub fn new(executor: TransferExecutor, store: Option<Arc<dyn ResumeStateStore>>) -> Self {
        TransferRunner { executor, store }
    }

    pub async fn run(&self, config: &ConfigSource) -> Result<RunOutcome, ExecutionError> {
        let saved = match &self.store {
            Some(store) => store.load().await?,
            None => None,
        };
        let resumed = saved.is_some();

        let result = match &saved {
            Some(state) => self.executor.resume(config, state).await,
            None => self.executor.run(config).await,
        };

        match result {
            Ok(result) => {
                if let Some(store) = &self.store {
                    store.delete().await?;
                }
                let next_config = config.merge(&result.config_diff);
                info!(resumed, "Committed.");
                Ok(RunOutcome {
                    result,
                    next_config,
                    resumed,
                })
            }
            Err(ExecutionError::PartiallyFailed(mut partial)) => {
                match &self.store {
                    Some(store) => {
                        if let Err(err) = store.save(&partial.resume_state).await {
                            error!(error = %err, "Failed to save resume state");
                            partial.suppressed.push(err.into());
                        } else {
                            warn!(
                                run_id = %partial.resume_state.run_id,
                                "Transfer can be resumed by running it again with the same resume state, or cleaned up with the cleanup command"
                            );
                        }
                    }
                    None => {
                        info!("No resume state store, cleaning up committed tasks");
                        if let Err(err) = self.executor.cleanup(config, &partial.resume_state).await
                        {
                            error!(error = %err, "Automatic cleanup failed");
                            partial.suppressed.push(err);
                        }
                    }
                }
                Err(ExecutionError::PartiallyFailed(partial))
            }
            Err(err) => Err(err),
        }
    }

    /// Cleans up the transfer recorded in the store and removes the state.
    /// Does nothing when there is no saved state.
    pub async fn cleanup(&self, config: &ConfigSource) -> Result<(), ExecutionError> {
        let Some(store) = &self.store else {
            return Err(ConfigError::Missing("resume state path".to_string()).into());
        };
        match store.load().await? {
            Some(state) => {
                self.executor.cleanup(config, &state).await?;
                store.delete().await?;
                info!(run_id = %state.run_id, "Cleaned up.");
            }
            None => info!("No resume state, nothing to clean up"),
        }
        Ok(())
    }
}
