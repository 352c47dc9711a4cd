use engine_config::{TaskReport, TaskSource};
use engine_core::{
    context::TaskContext,
    error::PluginError,
    plugin::{
        FilterPlugin, InputPlugin, OutputPlugin, PageOutput, TransactionalOutputRef,
        TransactionalPageOutput,
    },
};
use model::schema::Schema;
use std::sync::Arc;
use tracing::{debug, warn};

/// A filter with its frozen task and the schemas on both of its sides.
#[derive(Clone)]
pub struct FilterTask {
    pub plugin: Arc<dyn FilterPlugin>,
    pub task: TaskSource,
    pub input_schema: Schema,
    pub output_schema: Schema,
}

/// Result of one partition task. A side's report is present iff that side
/// committed.
#[derive(Debug)]
pub struct TaskOutcome {
    pub index: usize,
    pub input_report: Option<TaskReport>,
    pub output_report: Option<TaskReport>,
    pub error: Option<PluginError>,
}

impl TaskOutcome {
    fn new(index: usize) -> Self {
        TaskOutcome {
            index,
            input_report: None,
            output_report: None,
            error: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.error.is_none() && self.input_report.is_some() && self.output_report.is_some()
    }
}

/// Everything a partition task needs, frozen once the transactions of all
/// stages have started.
#[derive(Clone)]
pub struct TaskProcessor {
    pub input: Arc<dyn InputPlugin>,
    pub input_task: TaskSource,
    pub input_schema: Schema,
    pub filters: Vec<FilterTask>,
    pub output: Arc<dyn OutputPlugin>,
    pub output_task: TaskSource,
    pub output_schema: Schema,
}

impl TaskProcessor {
    /// Runs partition `ctx.task_index()` through input, filters and output.
    /// Blocking; errors are returned in the outcome, never raised.
    pub fn process(&self, ctx: &TaskContext) -> TaskOutcome {
        let _entered = ctx.span().enter();
        let index = ctx.task_index();
        let mut outcome = TaskOutcome::new(index);

        let mut tran = match self.output.open(&self.output_task, &self.output_schema, index) {
            Ok(tran) => tran,
            Err(err) => {
                outcome.error = Some(err);
                return outcome;
            }
        };

        let result = self
            .run_input(&mut *tran, ctx)
            .and_then(|input_report| {
                outcome.input_report = Some(input_report);
                tran.commit()
            });

        match result {
            Ok(output_report) => {
                debug!(task_index = index, "Task committed");
                outcome.output_report = Some(output_report);
            }
            Err(err) => {
                warn!(task_index = index, error = %err, "Task failed, aborting output");
                tran.abort();
                outcome.error = Some(err);
            }
        }
        tran.close();
        outcome
    }

    fn run_input(
        &self,
        tran: &mut dyn TransactionalPageOutput,
        ctx: &TaskContext,
    ) -> Result<TaskReport, PluginError> {
        let mut chain: Box<dyn PageOutput + '_> = Box::new(TransactionalOutputRef(tran));
        for filter in self.filters.iter().rev() {
            chain = filter.plugin.open(
                &filter.task,
                &filter.input_schema,
                &filter.output_schema,
                chain,
            )?;
        }

        let result = self
            .input
            .run(
                &self.input_task,
                &self.input_schema,
                ctx.task_index(),
                &mut *chain,
                ctx,
            )
            .and_then(|report| {
                chain.finish()?;
                Ok(report)
            });
        chain.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_config::{ConfigDiff, ConfigSource};
    use engine_core::{
        context::{ExecConfig, ExecSession},
        plugin::{FilterControl, InputControl, OutputControl, PageBuilder},
    };
    use model::{
        core::{column_type::ColumnType, identifiers::RunId, value::Value},
        records::Page,
    };
    use serde_json::json;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct RowsInput {
        rows: i64,
        fail_after: Option<i64>,
    }

    #[async_trait]
    impl InputPlugin for RowsInput {
        async fn transaction(
            &self,
            _config: &ConfigSource,
            _control: &mut dyn InputControl,
        ) -> Result<ConfigDiff, PluginError> {
            Ok(ConfigDiff::new())
        }

        async fn resume(
            &self,
            _task: &TaskSource,
            _schema: &Schema,
            _task_count: usize,
            _control: &mut dyn InputControl,
        ) -> Result<ConfigDiff, PluginError> {
            Ok(ConfigDiff::new())
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

        fn run(
            &self,
            _task: &TaskSource,
            schema: &Schema,
            task_index: usize,
            output: &mut dyn PageOutput,
            ctx: &TaskContext,
        ) -> Result<TaskReport, PluginError> {
            let mut builder = PageBuilder::new(ctx.allocator(), schema.clone(), output);
            for i in 0..self.rows {
                if self.fail_after == Some(i) {
                    return Err(PluginError::InvalidRecord(format!("row {i}")));
                }
                builder.set_long(0, i)?;
                builder.add_record()?;
            }
            builder.finish()?;
            Ok(TaskReport::new().set("rows", self.rows).set("index", task_index as i64))
        }
    }

    struct LogOutput {
        log: Log,
        fail_commit: bool,
    }

    #[async_trait]
    impl OutputPlugin for LogOutput {
        async fn transaction(
            &self,
            _config: &ConfigSource,
            _schema: &Schema,
            _task_count: usize,
            _control: &mut dyn OutputControl,
        ) -> Result<ConfigDiff, PluginError> {
            Ok(ConfigDiff::new())
        }

        async fn resume(
            &self,
            _task: &TaskSource,
            _schema: &Schema,
            _task_count: usize,
            _control: &mut dyn OutputControl,
        ) -> Result<ConfigDiff, PluginError> {
            Ok(ConfigDiff::new())
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
            schema: &Schema,
            _task_index: usize,
        ) -> Result<Box<dyn TransactionalPageOutput>, PluginError> {
            Ok(Box::new(LogSink {
                schema: schema.clone(),
                log: self.log.clone(),
                fail_commit: self.fail_commit,
            }))
        }
    }

    struct LogSink {
        schema: Schema,
        log: Log,
        fail_commit: bool,
    }

    impl LogSink {
        fn push(&self, event: String) {
            self.log.lock().unwrap().push(event);
        }
    }

    impl PageOutput for LogSink {
        fn add(&mut self, page: Page) -> Result<(), PluginError> {
            for row in page.to_values(&self.schema)? {
                self.push(format!("row {}", row[0]));
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<(), PluginError> {
            self.push("finish".into());
            Ok(())
        }

        fn close(&mut self) {
            self.push("close".into());
        }
    }

    impl TransactionalPageOutput for LogSink {
        fn abort(&mut self) {
            self.push("abort".into());
        }

        fn commit(&mut self) -> Result<TaskReport, PluginError> {
            if self.fail_commit {
                return Err(PluginError::other("disk full"));
            }
            self.push("commit".into());
            Ok(TaskReport::new().set("committed", true))
        }
    }

    /// Doubles every long value.
    struct DoubleFilter;

    #[async_trait]
    impl FilterPlugin for DoubleFilter {
        async fn transaction(
            &self,
            _config: &ConfigSource,
            input_schema: &Schema,
            control: &mut dyn FilterControl,
        ) -> Result<(), PluginError> {
            control.run(TaskSource::new(), input_schema.clone()).await
        }

        fn open<'a>(
            &self,
            _task: &TaskSource,
            _input_schema: &Schema,
            output_schema: &Schema,
            output: Box<dyn PageOutput + 'a>,
        ) -> Result<Box<dyn PageOutput + 'a>, PluginError> {
            Ok(Box::new(Doubling {
                schema: output_schema.clone(),
                output,
            }))
        }
    }

    struct Doubling<'a> {
        schema: Schema,
        output: Box<dyn PageOutput + 'a>,
    }

    impl PageOutput for Doubling<'_> {
        fn add(&mut self, page: Page) -> Result<(), PluginError> {
            let rows = page.to_values(&self.schema)?;
            let alloc = model::buffer::BufferAllocator::default();
            let mut builder = PageBuilder::new(&alloc, self.schema.clone(), &mut *self.output);
            for row in rows {
                match row[0] {
                    Value::Long(v) => builder.set_long(0, v * 2)?,
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

    fn schema() -> Schema {
        Schema::builder().add("n", ColumnType::Long).build().unwrap()
    }

    fn context(index: usize) -> TaskContext {
        let session = ExecSession::new(RunId::new("run-test"), ExecConfig::default());
        TaskContext::new(Arc::new(session), index)
    }

    fn processor(input: RowsInput, output: LogOutput, filters: Vec<FilterTask>) -> TaskProcessor {
        TaskProcessor {
            input: Arc::new(input),
            input_task: TaskSource::new(),
            input_schema: schema(),
            filters,
            output: Arc::new(output),
            output_task: TaskSource::new(),
            output_schema: schema(),
        }
    }

    #[test]
    fn commits_both_sides() {
        let log = Log::default();
        let processor = processor(
            RowsInput { rows: 2, fail_after: None },
            LogOutput { log: log.clone(), fail_commit: false },
            Vec::new(),
        );

        let outcome = processor.process(&context(1));

        assert!(outcome.is_committed());
        assert_eq!(outcome.index, 1);
        assert_eq!(
            outcome.input_report.unwrap().to_value(),
            json!({"rows": 2, "index": 1})
        );
        assert_eq!(
            *log.lock().unwrap(),
            ["row 0", "row 1", "finish", "commit", "close"]
        );
    }

    #[test]
    fn filters_transform_pages_before_output() {
        let log = Log::default();
        let filter = FilterTask {
            plugin: Arc::new(DoubleFilter),
            task: TaskSource::new(),
            input_schema: schema(),
            output_schema: schema(),
        };
        let processor = processor(
            RowsInput { rows: 3, fail_after: None },
            LogOutput { log: log.clone(), fail_commit: false },
            vec![filter.clone(), filter],
        );

        let outcome = processor.process(&context(0));

        assert!(outcome.is_committed());
        assert_eq!(
            *log.lock().unwrap(),
            ["row 0", "row 4", "row 8", "finish", "commit", "close"]
        );
    }

    #[test]
    fn input_failure_aborts_output() {
        let log = Log::default();
        let processor = processor(
            RowsInput { rows: 3, fail_after: Some(1) },
            LogOutput { log: log.clone(), fail_commit: false },
            Vec::new(),
        );

        let outcome = processor.process(&context(0));

        assert!(matches!(outcome.error, Some(PluginError::InvalidRecord(_))));
        assert!(outcome.input_report.is_none());
        assert!(outcome.output_report.is_none());
        // the row built before the failure is still flushed downstream
        assert_eq!(*log.lock().unwrap(), ["row 0", "abort", "close"]);
    }

    #[test]
    fn commit_failure_keeps_the_input_report() {
        let log = Log::default();
        let processor = processor(
            RowsInput { rows: 1, fail_after: None },
            LogOutput { log: log.clone(), fail_commit: true },
            Vec::new(),
        );

        let outcome = processor.process(&context(0));

        assert!(!outcome.is_committed());
        assert!(outcome.input_report.is_some());
        assert!(outcome.output_report.is_none());
        assert_eq!(*log.lock().unwrap(), ["row 0", "finish", "abort", "close"]);
    }
}
