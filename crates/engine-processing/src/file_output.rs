use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigError, ConfigSource, TaskReport, TaskSource};
use engine_core::{
    error::PluginError,
    plugin::{
        EncoderControl, EncoderPlugin, FileOutputControl, FileOutputPlugin, FormatterControl,
        FormatterPlugin, OutputControl, OutputPlugin, PluginRegistry, TransactionalPageOutput,
    },
};
use futures::future::BoxFuture;
use model::schema::Schema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Composes a formatter, its encoders and a file output into one output
/// plugin.
pub struct FileOutputRunner {
    file_output: Arc<dyn FileOutputPlugin>,
    encoders: Vec<Arc<dyn EncoderPlugin>>,
    formatter: Arc<dyn FormatterPlugin>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunnerTask {
    encoder_configs: Vec<ConfigSource>,
    formatter_config: ConfigSource,
    file_output_task: TaskSource,
    encoder_tasks: Vec<TaskSource>,
    formatter_task: TaskSource,
}

impl FileOutputRunner {
    pub fn new(
        file_output: Arc<dyn FileOutputPlugin>,
        encoders: Vec<Arc<dyn EncoderPlugin>>,
        formatter: Arc<dyn FormatterPlugin>,
    ) -> Self {
        FileOutputRunner {
            file_output,
            encoders,
            formatter,
        }
    }

    pub fn resolve(registry: &PluginRegistry, config: &ConfigSource) -> Result<Self, PluginError> {
        let file_output = registry.file_output(&config.require::<String>("type")?)?;
        let encoders = config
            .nested_list("encoders")?
            .iter()
            .map(|c| registry.encoder(&c.require::<String>("type")?))
            .collect::<Result<Vec<_>, _>>()?;
        let formatter_config = formatter_config(config)?;
        let formatter = registry.formatter(&formatter_config.require::<String>("type")?)?;
        Ok(Self::new(file_output, encoders, formatter))
    }

    fn run_encoders<'a, 't>(
        &'a self,
        index: usize,
        configs: &'a [ConfigSource],
        tasks: &'a mut Vec<TaskSource>,
        tail: &'a mut FormatterTail<'t>,
    ) -> BoxFuture<'a, Result<(), PluginError>> {
        Box::pin(async move {
            match (self.encoders.get(index), configs.get(index)) {
                (Some(encoder), Some(config)) => {
                    let mut stage = EncoderStage {
                        runner: self,
                        configs,
                        index,
                        tasks,
                        tail,
                    };
                    encoder.transaction(config, &mut stage).await
                }
                _ => tail.run_formatter(self, std::mem::take(tasks)).await,
            }
        })
    }
}

fn formatter_config(config: &ConfigSource) -> Result<ConfigSource, PluginError> {
    Ok(config
        .nested("formatter")?
        .ok_or_else(|| ConfigError::Missing("formatter".to_string()))?)
}

#[async_trait]
impl OutputPlugin for FileOutputRunner {
    async fn transaction(
        &self,
        config: &ConfigSource,
        schema: &Schema,
        task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let mut file_control = RunnerControl {
            runner: self,
            encoder_configs: config.nested_list("encoders")?,
            formatter_config: formatter_config(config)?,
            schema,
            control,
        };
        self.file_output
            .transaction(config, task_count, &mut file_control)
            .await
    }

    async fn resume(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let task: RunnerTask = task.load_task()?;
        let mut file_control = RunnerControl {
            runner: self,
            encoder_configs: task.encoder_configs,
            formatter_config: task.formatter_config,
            schema,
            control,
        };
        self.file_output
            .resume(&task.file_output_task, task_count, &mut file_control)
            .await
    }

    async fn cleanup(
        &self,
        task: &TaskSource,
        _schema: &Schema,
        task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError> {
        let task: RunnerTask = task.load_task()?;
        self.file_output
            .cleanup(&task.file_output_task, task_count, successful)
            .await
    }

    fn open(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_index: usize,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError> {
        let task: RunnerTask = task.load_task()?;

        let mut output = self.file_output.open(&task.file_output_task, task_index)?;
        // the first configured encoder sees the formatter's bytes first
        for (encoder, encoder_task) in self.encoders.iter().zip(&task.encoder_tasks).rev() {
            output = encoder.open(encoder_task, output)?;
        }
        self.formatter.open(&task.formatter_task, schema, output)
    }
}

struct RunnerControl<'c> {
    runner: &'c FileOutputRunner,
    encoder_configs: Vec<ConfigSource>,
    formatter_config: ConfigSource,
    schema: &'c Schema,
    control: &'c mut dyn OutputControl,
}

#[async_trait]
impl FileOutputControl for RunnerControl<'_> {
    async fn run(&mut self, file_output_task: TaskSource) -> Result<Vec<TaskReport>, PluginError> {
        let mut tail = FormatterTail {
            encoder_configs: &self.encoder_configs,
            formatter_config: &self.formatter_config,
            schema: self.schema,
            file_output_task,
            control: &mut *self.control,
            reports: None,
        };
        let mut encoder_tasks = Vec::with_capacity(self.encoder_configs.len());
        self.runner
            .run_encoders(0, &self.encoder_configs, &mut encoder_tasks, &mut tail)
            .await?;

        tail.reports.ok_or_else(|| {
            PluginError::other("formatter transaction returned without running the tasks")
        })
    }
}

struct EncoderStage<'a, 't> {
    runner: &'a FileOutputRunner,
    configs: &'a [ConfigSource],
    index: usize,
    tasks: &'a mut Vec<TaskSource>,
    tail: &'a mut FormatterTail<'t>,
}

#[async_trait]
impl EncoderControl for EncoderStage<'_, '_> {
    async fn run(&mut self, task: TaskSource) -> Result<(), PluginError> {
        self.tasks.push(task);
        self.runner
            .run_encoders(self.index + 1, self.configs, self.tasks, self.tail)
            .await
    }
}

struct FormatterTail<'t> {
    encoder_configs: &'t [ConfigSource],
    formatter_config: &'t ConfigSource,
    schema: &'t Schema,
    file_output_task: TaskSource,
    control: &'t mut dyn OutputControl,
    reports: Option<Vec<TaskReport>>,
}

impl FormatterTail<'_> {
    async fn run_formatter(
        &mut self,
        runner: &FileOutputRunner,
        encoder_tasks: Vec<TaskSource>,
    ) -> Result<(), PluginError> {
        let formatter_config = self.formatter_config.clone();
        let schema = self.schema.clone();
        let mut stage = FormatterStage {
            tail: self,
            encoder_tasks,
        };
        runner
            .formatter
            .transaction(&formatter_config, &schema, &mut stage)
            .await
    }
}

struct FormatterStage<'a, 't> {
    tail: &'a mut FormatterTail<'t>,
    encoder_tasks: Vec<TaskSource>,
}

#[async_trait]
impl FormatterControl for FormatterStage<'_, '_> {
    async fn run(&mut self, formatter_task: TaskSource) -> Result<(), PluginError> {
        let task = RunnerTask {
            encoder_configs: self.tail.encoder_configs.to_vec(),
            formatter_config: self.tail.formatter_config.clone(),
            file_output_task: self.tail.file_output_task.clone(),
            encoder_tasks: std::mem::take(&mut self.encoder_tasks),
            formatter_task,
        };
        debug!(encoders = task.encoder_tasks.len(), "Running file output tasks");
        let reports = self.tail.control.run(TaskSource::dump(&task)?).await?;
        self.tail.reports = Some(reports);
        Ok(())
    }
}
