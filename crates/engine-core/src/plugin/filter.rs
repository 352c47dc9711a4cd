use crate::{error::PluginError, plugin::page::PageOutput};
use async_trait::async_trait;
use engine_config::{ConfigSource, TaskSource};
use model::schema::Schema;

#[async_trait]
pub trait FilterControl: Send {
    async fn run(&mut self, task: TaskSource, output_schema: Schema) -> Result<(), PluginError>;
}

/// Transforms pages between the input and the output.
#[async_trait]
pub trait FilterPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        input_schema: &Schema,
        control: &mut dyn FilterControl,
    ) -> Result<(), PluginError>;

    /// Wraps `output` with this filter's page transformation.
    fn open<'a>(
        &self,
        task: &TaskSource,
        input_schema: &Schema,
        output_schema: &Schema,
        output: Box<dyn PageOutput + 'a>,
    ) -> Result<Box<dyn PageOutput + 'a>, PluginError>;
}
