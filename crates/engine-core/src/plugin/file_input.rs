use crate::{context::TaskContext, error::PluginError, plugin::page::PageOutput};
use async_trait::async_trait;
use bytes::Bytes;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use model::schema::Schema;

/// Byte stream of one input task, split into files.
pub trait FileInput: Send {
    /// Advances to the next file. Returns `false` when no file is left.
    fn next_file(&mut self) -> Result<bool, PluginError>;

    /// Next chunk of the current file, `None` at its end.
    fn poll(&mut self) -> Result<Option<Bytes>, PluginError>;

    fn close(&mut self) {}

    fn abort(&mut self);

    fn commit(&mut self) -> Result<TaskReport, PluginError>;
}

impl<T: FileInput + ?Sized> FileInput for Box<T> {
    fn next_file(&mut self) -> Result<bool, PluginError> {
        (**self).next_file()
    }

    fn poll(&mut self) -> Result<Option<Bytes>, PluginError> {
        (**self).poll()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn abort(&mut self) {
        (**self).abort()
    }

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        (**self).commit()
    }
}

#[async_trait]
pub trait FileInputControl: Send {
    async fn run(
        &mut self,
        task: TaskSource,
        task_count: usize,
    ) -> Result<Vec<TaskReport>, PluginError>;
}

#[async_trait]
pub trait FileInputPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn FileInputControl,
    ) -> Result<ConfigDiff, PluginError>;

    async fn resume(
        &self,
        task: &TaskSource,
        task_count: usize,
        control: &mut dyn FileInputControl,
    ) -> Result<ConfigDiff, PluginError>;

    async fn cleanup(
        &self,
        task: &TaskSource,
        task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError>;

    fn open(&self, task: &TaskSource, task_index: usize) -> Result<Box<dyn FileInput>, PluginError>;
}

#[async_trait]
pub trait DecoderControl: Send {
    async fn run(&mut self, task: TaskSource) -> Result<(), PluginError>;
}

/// Transforms the byte stream of a file input (decompression, decryption).
#[async_trait]
pub trait DecoderPlugin: Send + Sync {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn DecoderControl,
    ) -> Result<(), PluginError>;

    /// Wraps `input`. The returned input forwards `commit` and `abort`.
    fn open(
        &self,
        task: &TaskSource,
        input: Box<dyn FileInput>,
    ) -> Result<Box<dyn FileInput>, PluginError>;
}

#[async_trait]
pub trait ParserControl: Send {
    async fn run(&mut self, task: TaskSource, schema: Schema) -> Result<(), PluginError>;
}

/// Turns a byte stream into typed records.
#[async_trait]
pub trait ParserPlugin: Send + Sync {
    /// Derives the task and the schema from `config`.
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn ParserControl,
    ) -> Result<(), PluginError>;

    fn run(
        &self,
        task: &TaskSource,
        schema: &Schema,
        input: &mut dyn FileInput,
        output: &mut dyn PageOutput,
        ctx: &TaskContext,
    ) -> Result<(), PluginError>;
}
