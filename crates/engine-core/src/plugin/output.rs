use crate::{error::PluginError, plugin::page::TransactionalPageOutput};
use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use model::schema::Schema;

/// Runs the output side of every partition task and returns the output
/// task reports in partition order.
#[async_trait]
pub trait OutputControl: Send {
    async fn run(&mut self, task: TaskSource) -> Result<Vec<TaskReport>, PluginError>;
}

#[async_trait]
pub trait OutputPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        schema: &Schema,
        task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError>;

    async fn resume(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError>;

    async fn cleanup(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError>;

    fn open(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_index: usize,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError>;
}
