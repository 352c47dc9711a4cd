use crate::{error::PluginError, plugin::page::TransactionalPageOutput};
use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use model::schema::Schema;

/// Byte sink of one output task, split into files.
pub trait FileOutput: Send {
    fn next_file(&mut self) -> Result<(), PluginError>;

    fn add(&mut self, data: &[u8]) -> Result<(), PluginError>;

    fn finish(&mut self) -> Result<(), PluginError>;

    fn close(&mut self) {}
}

pub trait TransactionalFileOutput: FileOutput {
    fn abort(&mut self);

    fn commit(&mut self) -> Result<TaskReport, PluginError>;
}

impl<T: FileOutput + ?Sized> FileOutput for Box<T> {
    fn next_file(&mut self) -> Result<(), PluginError> {
        (**self).next_file()
    }

    fn add(&mut self, data: &[u8]) -> Result<(), PluginError> {
        (**self).add(data)
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        (**self).finish()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: TransactionalFileOutput + ?Sized> TransactionalFileOutput for Box<T> {
    fn abort(&mut self) {
        (**self).abort()
    }

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        (**self).commit()
    }
}

#[async_trait]
pub trait FileOutputControl: Send {
    async fn run(&mut self, task: TaskSource) -> Result<Vec<TaskReport>, PluginError>;
}

#[async_trait]
pub trait FileOutputPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        task_count: usize,
        control: &mut dyn FileOutputControl,
    ) -> Result<ConfigDiff, PluginError>;

    async fn resume(
        &self,
        task: &TaskSource,
        task_count: usize,
        control: &mut dyn FileOutputControl,
    ) -> Result<ConfigDiff, PluginError>;

    async fn cleanup(
        &self,
        task: &TaskSource,
        task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError>;

    fn open(
        &self,
        task: &TaskSource,
        task_index: usize,
    ) -> Result<Box<dyn TransactionalFileOutput>, PluginError>;
}

#[async_trait]
pub trait EncoderControl: Send {
    async fn run(&mut self, task: TaskSource) -> Result<(), PluginError>;
}

/// Transforms the byte stream written to a file output (compression).
#[async_trait]
pub trait EncoderPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn EncoderControl,
    ) -> Result<(), PluginError>;

    /// Wraps `output`. The returned output forwards `commit` and `abort`.
    fn open(
        &self,
        task: &TaskSource,
        output: Box<dyn TransactionalFileOutput>,
    ) -> Result<Box<dyn TransactionalFileOutput>, PluginError>;
}

#[async_trait]
pub trait FormatterControl: Send {
    async fn run(&mut self, task: TaskSource) -> Result<(), PluginError>;
}

/// Renders pages into bytes.
#[async_trait]
pub trait FormatterPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        schema: &Schema,
        control: &mut dyn FormatterControl,
    ) -> Result<(), PluginError>;

    fn open(
        &self,
        task: &TaskSource,
        schema: &Schema,
        output: Box<dyn TransactionalFileOutput>,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError>;
}
