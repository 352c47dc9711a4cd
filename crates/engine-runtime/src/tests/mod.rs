mod runner;

use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use engine_core::{
    context::TaskContext,
    error::PluginError,
    plugin::{
        FilterControl, FilterPlugin, InputControl, InputPlugin, OutputControl, OutputPlugin,
        PageBuilder, PageOutput, PluginRegistry, TransactionalPageOutput,
    },
};
use model::{
    core::{column_type::ColumnType, value::Value},
    records::Page,
    schema::Schema,
};
use serde_json::json;
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};

/// Shared view into what the mock plugins did, and switches to make their
/// tasks fail.
#[derive(Default)]
pub(crate) struct Recorder {
    pub ran: Mutex<Vec<usize>>,
    pub fail: Mutex<HashSet<usize>>,
    pub panic: Mutex<HashSet<usize>>,
    pub cleanups: Mutex<Vec<(&'static str, Vec<TaskReport>)>>,
    pub written: Mutex<BTreeMap<usize, Vec<i64>>>,
}

impl Recorder {
    pub fn fail_tasks(&self, indices: &[usize]) {
        *self.fail.lock().unwrap() = indices.iter().copied().collect();
    }

    pub fn ran(&self) -> Vec<usize> {
        let mut ran = self.ran.lock().unwrap().clone();
        ran.sort();
        ran
    }

    pub fn reset_ran(&self) {
        self.ran.lock().unwrap().clear();
    }

    pub fn cleanups(&self) -> Vec<(&'static str, usize)> {
        self.cleanups
            .lock()
            .unwrap()
            .iter()
            .map(|(side, reports)| (*side, reports.len()))
            .collect()
    }

    pub fn written(&self) -> BTreeMap<usize, Vec<i64>> {
        self.written.lock().unwrap().clone()
    }
}

pub(crate) fn registry(recorder: &Arc<Recorder>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register_input("mock", Arc::new(MockInput(recorder.clone())))
        .register_output("mock", Arc::new(MockOutput(recorder.clone())))
        .register_filter("plus_one", Arc::new(PlusOne));
    registry
}

pub(crate) fn config(tasks: usize) -> ConfigSource {
    ConfigSource::from_value(json!({
        "exec": {"max_threads": 2},
        "in": {"type": "mock", "tasks": tasks, "rows": 2},
        "out": {"type": "mock"},
    }))
    .unwrap()
}

fn schema() -> Schema {
    Schema::builder().add("id", ColumnType::Long).build().unwrap()
}

fn input_diff(reports: &[TaskReport]) -> ConfigDiff {
    ConfigDiff::new()
        .set("tasks", reports.len() as i64)
        .set_nested("last", ConfigDiff::merge_all(reports))
}

struct MockInput(Arc<Recorder>);

#[async_trait]
impl InputPlugin for MockInput {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn InputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let tasks = config.require::<usize>("tasks")?;
        let task = TaskSource::new().set("rows", config.get_or::<i64>("rows", 1)?);
        let reports = control.run(task, schema(), tasks).await?;
        Ok(input_diff(&reports))
    }

    async fn resume(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_count: usize,
        control: &mut dyn InputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let reports = control.run(task.clone(), schema.clone(), task_count).await?;
        Ok(input_diff(&reports))
    }

    async fn cleanup(
        &self,
        _task: &TaskSource,
        _schema: &Schema,
        _task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError> {
        self.0.cleanups.lock().unwrap().push(("in", successful.to_vec()));
        Ok(())
    }

    fn run(
        &self,
        task: &TaskSource,
        schema: &Schema,
        task_index: usize,
        output: &mut dyn PageOutput,
        ctx: &TaskContext,
    ) -> Result<TaskReport, PluginError> {
        self.0.ran.lock().unwrap().push(task_index);
        if self.0.panic.lock().unwrap().contains(&task_index) {
            panic!("task {task_index} exploded");
        }

        let rows = task.require::<i64>("rows")?;
        let mut builder = PageBuilder::new(ctx.allocator(), schema.clone(), output)
            .with_metrics(ctx.metrics().clone());
        for row in 0..rows {
            builder.set_long(0, task_index as i64 * 100 + row)?;
            builder.add_record()?;
        }
        if self.0.fail.lock().unwrap().contains(&task_index) {
            return Err(PluginError::InvalidRecord(format!("bad row in task {task_index}")));
        }
        builder.finish()?;
        Ok(TaskReport::new().set("index", task_index as i64))
    }
}

struct MockOutput(Arc<Recorder>);

fn output_diff(reports: &[TaskReport]) -> Result<ConfigDiff, PluginError> {
    let mut rows = 0;
    for report in reports {
        rows += report.require::<i64>("rows")?;
    }
    Ok(ConfigDiff::new().set("rows", rows))
}

#[async_trait]
impl OutputPlugin for MockOutput {
    async fn transaction(
        &self,
        _config: &ConfigSource,
        _schema: &Schema,
        _task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let reports = control.run(TaskSource::new().set("target", "memory")).await?;
        output_diff(&reports)
    }

    async fn resume(
        &self,
        task: &TaskSource,
        _schema: &Schema,
        _task_count: usize,
        control: &mut dyn OutputControl,
    ) -> Result<ConfigDiff, PluginError> {
        let reports = control.run(task.clone()).await?;
        output_diff(&reports)
    }

    async fn cleanup(
        &self,
        _task: &TaskSource,
        _schema: &Schema,
        _task_count: usize,
        successful: &[TaskReport],
    ) -> Result<(), PluginError> {
        self.0.cleanups.lock().unwrap().push(("out", successful.to_vec()));
        Ok(())
    }

    fn open(
        &self,
        _task: &TaskSource,
        schema: &Schema,
        task_index: usize,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError> {
        Ok(Box::new(MemorySink {
            recorder: self.0.clone(),
            schema: schema.clone(),
            index: task_index,
            rows: Vec::new(),
        }))
    }
}

struct MemorySink {
    recorder: Arc<Recorder>,
    schema: Schema,
    index: usize,
    rows: Vec<i64>,
}

impl PageOutput for MemorySink {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        for record in page.records(&self.schema) {
            if let Some(v) = record.get_long(0)? {
                self.rows.push(v);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

impl TransactionalPageOutput for MemorySink {
    fn abort(&mut self) {
        self.rows.clear();
    }

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        let rows = std::mem::take(&mut self.rows);
        let count = rows.len() as i64;
        self.recorder.written.lock().unwrap().insert(self.index, rows);
        Ok(TaskReport::new().set("rows", count))
    }
}

/// Adds one to every value of the first column.
struct PlusOne;

#[async_trait]
impl FilterPlugin for PlusOne {
    async fn transaction(
        &self,
        _config: &ConfigSource,
        input_schema: &Schema,
        control: &mut dyn FilterControl,
    ) -> Result<(), PluginError> {
        control
            .run(TaskSource::new().set("delta", 1), input_schema.clone())
            .await
    }

    fn open<'a>(
        &self,
        task: &TaskSource,
        _input_schema: &Schema,
        output_schema: &Schema,
        output: Box<dyn PageOutput + 'a>,
    ) -> Result<Box<dyn PageOutput + 'a>, PluginError> {
        Ok(Box::new(PlusOneOutput {
            delta: task.require::<i64>("delta")?,
            schema: output_schema.clone(),
            output,
        }))
    }
}

struct PlusOneOutput<'a> {
    delta: i64,
    schema: Schema,
    output: Box<dyn PageOutput + 'a>,
}

impl PageOutput for PlusOneOutput<'_> {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        let rows = page.to_values(&self.schema)?;
        drop(page);
        let allocator = model::buffer::BufferAllocator::default();
        let mut builder = PageBuilder::new(&allocator, self.schema.clone(), &mut *self.output);
        for row in rows {
            match row[0] {
                Value::Long(v) => builder.set_long(0, v + self.delta)?,
                _ => builder.set_null(0)?,
            }
            builder.add_record()?;
        }
        builder.finish()
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        self.output.finish()
    }

    fn close(&mut self) {
        self.output.close()
    }
}
