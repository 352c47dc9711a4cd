use crate::{context::TaskContext, error::PluginError, plugin::page::PageOutput};
use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use model::schema::Schema;

/// Runs the partition tasks of an input. Returns the task reports in
/// partition order once every task finished.
#[async_trait]
pub trait InputControl: Send {
    async fn run(
        &mut self,
        task: TaskSource,
        schema: Schema,
        task_count: usize,
    ) -> Result<Vec<TaskReport>, PluginError>;
}

#[async_trait]
pub trait InputPlugin: Send + Sync {
    /// Derives the task and schema from `config`, runs the tasks through
    /// `control` and builds the input config diff from their reports.
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn InputControl,
    ) -> Result<ConfigDiff, PluginError>;

    /// Re-enters a transaction from a saved task and schema.
    async fn resume(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_count: usize,
        control: &mut dyn InputControl,
    ) -> Result<ConfigDiff, PluginError>;

    /// Releases whatever the committed tasks left behind. Must tolerate
    /// resources that were already removed.
    async fn cleanup(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError>;

    /// Reads partition `task_index` into `output`. Never assumes siblings ran
    /// before it, or at all.
    fn run(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_index: usize,
        output: &mut dyn PageOutput,
        ctx: &TaskContext,
    ) -> Result<TaskReport, PluginError>;
}
