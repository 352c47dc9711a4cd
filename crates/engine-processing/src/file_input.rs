use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigError, ConfigSource, TaskReport, TaskSource};
use engine_core::{
    context::TaskContext,
    error::PluginError,
    plugin::{
        DecoderControl, DecoderPlugin, FileInput, FileInputControl, FileInputPlugin, InputControl,
        InputPlugin, PageOutput, ParserControl, ParserPlugin, PluginRegistry,
    },
};
use futures::future::BoxFuture;
use model::schema::Schema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Composes a file input, its decoders and a parser into one input plugin.
pub struct FileInputRunner {
    file_input: Arc<dyn FileInputPlugin>,
    decoders: Vec<Arc<dyn DecoderPlugin>>,
    parser: Arc<dyn ParserPlugin>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunnerTask {
    decoder_configs: Vec<ConfigSource>,
    parser_config: ConfigSource,
    file_input_task: TaskSource,
    decoder_tasks: Vec<TaskSource>,
    parser_task: TaskSource,
}

impl FileInputRunner {
    pub fn new(
        file_input: Arc<dyn FileInputPlugin>,
        decoders: Vec<Arc<dyn DecoderPlugin>>,
        parser: Arc<dyn ParserPlugin>,
    ) -> Self {
        FileInputRunner {
            file_input,
            decoders,
            parser,
        }
    }

    /// Looks up the file input named by `type`, the decoders listed under
    /// `decoders` and the parser under `parser`.
    pub fn resolve(registry: &PluginRegistry, config: &ConfigSource) -> Result<Self, PluginError> {
        let file_input = registry.file_input(&config.require::<String>("type")?)?;
        let decoders = config
            .nested_list("decoders")?
            .iter()
            .map(|c| registry.decoder(&c.require::<String>("type")?))
            .collect::<Result<Vec<_>, _>>()?;
        let parser_config = parser_config(config)?;
        let parser = registry.parser(&parser_config.require::<String>("type")?)?;
        Ok(Self::new(file_input, decoders, parser))
    }

    fn run_decoders<'a, 't>(
        &'a self,
        index: usize,
        configs: &'a [ConfigSource],
        tasks: &'a mut Vec<TaskSource>,
        tail: &'a mut ParserTail<'t>,
    ) -> BoxFuture<'a, Result<(), PluginError>> {
        Box::pin(async move {
            match (self.decoders.get(index), configs.get(index)) {
                (Some(decoder), Some(config)) => {
                    let mut stage = DecoderStage {
                        runner: self,
                        configs,
                        index,
                        tasks,
                        tail,
                    };
                    decoder.transaction(config, &mut stage).await
                }
                _ => tail.run_parser(self, std::mem::take(tasks)).await,
            }
        })
    }
}

fn parser_config(config: &ConfigSource) -> Result<ConfigSource, PluginError> {
    Ok(config
        .nested("parser")?
        .ok_or_else(|| ConfigError::Missing("parser".to_string()))?)
}

#[async_trait]
impl InputPlugin for FileInputRunner {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn InputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let decoder_configs = config.nested_list("decoders")?;
        let parser_config = parser_config(config)?;
        let mut file_control = RunnerControl {
            runner: self,
            decoder_configs,
            parser_config,
            control,
        };
        self.file_input.transaction(config, &mut file_control).await
    }

    async fn resume(
        &self,
        task: &TaskSource,
        _schema: &Schema,
        task_count: usize,
        control: &mut dyn InputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let task: RunnerTask = task.load_task()?;
        let mut file_control = RunnerControl {
            runner: self,
            decoder_configs: task.decoder_configs,
            parser_config: task.parser_config,
            control,
        };
        self.file_input
            .resume(&task.file_input_task, task_count, &mut file_control)
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
        self.file_input
            .cleanup(&task.file_input_task, task_count, successful)
            .await
    }

    fn run(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_index: usize,
        output: &mut dyn PageOutput,
        ctx: &TaskContext,
    ) -> Result<TaskReport, PluginError> {
        let task: RunnerTask = task.load_task()?;

        let mut input = self.file_input.open(&task.file_input_task, task_index)?;
        for (decoder, decoder_task) in self.decoders.iter().zip(&task.decoder_tasks) {
            input = decoder.open(decoder_task, input)?;
        }

        let result = self
            .parser
            .run(&task.parser_task, schema, &mut *input, output, ctx)
            .and_then(|()| input.commit());
        if let Err(err) = &result {
            warn!(task_index, error = %err, "Aborting file input");
            input.abort();
        }
        input.close();
        result
    }
}

/// Control handed to the file input plugin.
struct RunnerControl<'c> {
    runner: &'c FileInputRunner,
    decoder_configs: Vec<ConfigSource>,
    parser_config: ConfigSource,
    control: &'c mut dyn InputControl,
}

#[async_trait]
impl FileInputControl for RunnerControl<'_> {
    async fn run(
        &mut self,
        file_input_task: TaskSource,
        task_count: usize,
    ) -> Result<Vec<TaskReport>, PluginError> {
        let mut tail = ParserTail {
            decoder_configs: &self.decoder_configs,
            parser_config: &self.parser_config,
            file_input_task,
            task_count,
            control: &mut *self.control,
            reports: None,
        };
        let mut decoder_tasks = Vec::with_capacity(self.decoder_configs.len());
        self.runner
            .run_decoders(0, &self.decoder_configs, &mut decoder_tasks, &mut tail)
            .await?;

        tail.reports.ok_or_else(|| {
            PluginError::other("parser transaction returned without running the tasks")
        })
    }
}

struct DecoderStage<'a, 't> {
    runner: &'a FileInputRunner,
    configs: &'a [ConfigSource],
    index: usize,
    tasks: &'a mut Vec<TaskSource>,
    tail: &'a mut ParserTail<'t>,
}

#[async_trait]
impl DecoderControl for DecoderStage<'_, '_> {
    async fn run(&mut self, task: TaskSource) -> Result<(), PluginError> {
        self.tasks.push(task);
        self.runner
            .run_decoders(self.index + 1, self.configs, self.tasks, self.tail)
            .await
    }
}

/// Innermost stage: runs the parser transaction, then the engine's tasks.
struct ParserTail<'t> {
    decoder_configs: &'t [ConfigSource],
    parser_config: &'t ConfigSource,
    file_input_task: TaskSource,
    task_count: usize,
    control: &'t mut dyn InputControl,
    reports: Option<Vec<TaskReport>>,
}

impl ParserTail<'_> {
    async fn run_parser(
        &mut self,
        runner: &FileInputRunner,
        decoder_tasks: Vec<TaskSource>,
    ) -> Result<(), PluginError> {
        let parser_config = self.parser_config.clone();
        let mut stage = ParserStage {
            tail: self,
            decoder_tasks,
        };
        runner.parser.transaction(&parser_config, &mut stage).await
    }
}

struct ParserStage<'a, 't> {
    tail: &'a mut ParserTail<'t>,
    decoder_tasks: Vec<TaskSource>,
}

#[async_trait]
impl ParserControl for ParserStage<'_, '_> {
    async fn run(&mut self, parser_task: TaskSource, schema: Schema) -> Result<(), PluginError> {
        let task = RunnerTask {
            decoder_configs: self.tail.decoder_configs.to_vec(),
            parser_config: self.tail.parser_config.clone(),
            file_input_task: self.tail.file_input_task.clone(),
            decoder_tasks: std::mem::take(&mut self.decoder_tasks),
            parser_task,
        };
        debug!(columns = schema.len(), task_count = self.tail.task_count, "Running file input tasks");
        let reports = self
            .tail
            .control
            .run(TaskSource::dump(&task)?, schema, self.tail.task_count)
            .await?;
        self.tail.reports = Some(reports);
        Ok(())
    }
}
