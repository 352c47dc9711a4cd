use crate::output::run_counting;
use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use engine_core::{
    error::PluginError,
    plugin::{OutputControl, OutputPlugin, PageOutput, TransactionalPageOutput},
};
use model::{records::Page, schema::Schema};

/// Discards every record. Reports how many it saw.
pub struct NullOutputPlugin;

#[async_trait]
impl OutputPlugin for NullOutputPlugin {
    async fn transaction(
        &self,
        _config: &ConfigSource,
        _schema: &Schema,
        _task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        run_counting(TaskSource::new(), control).await
    }

    async fn resume(
        &self,
        task: &TaskSource,
        _schema: &Schema,
        _task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        run_counting(task.clone(), control).await
    }

    async fn cleanup(
        &self,
        _task: &TaskSource,
        _schema: &Schema,
        _task_count: usize,
        _successful: &[TaskReport],
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn open(
        &self,
        _task: &TaskSource,
        _schema: &Schema,
        _task_index: usize,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError> {
        Ok(Box::new(NullSink { records: 0 }))
    }
}

struct NullSink {
    records: usize,
}

impl PageOutput for NullSink {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        self.records += page.record_count();
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

impl TransactionalPageOutput for NullSink {
    fn abort(&mut self) {}

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        Ok(TaskReport::new().set("records", self.records as i64))
    }
}
