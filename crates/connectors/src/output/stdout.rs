use crate::output::run_counting;
use async_trait::async_trait;
use engine_config::{ConfigDiff, ConfigSource, TaskReport, TaskSource};
use engine_core::{
    error::PluginError,
    plugin::{OutputControl, OutputPlugin, PageOutput, TransactionalPageOutput},
};
use model::{core::value::Value, records::Page, schema::Schema};
use std::io::{self, Write};

/// Prints each record as one comma-separated line. Nulls print as empty.
pub struct StdoutOutputPlugin;

#[async_trait]
impl OutputPlugin for StdoutOutputPlugin {
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
        schema: &Schema,
        _task_index: usize,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError> {
        Ok(Box::new(RowPrinter::new(schema.clone(), io::stdout())))
    }
}

/// Renders records as text lines into any writer.
pub(crate) struct RowPrinter<W> {
    schema: Schema,
    writer: W,
    records: usize,
}

impl<W: Write + Send> RowPrinter<W> {
    pub(crate) fn new(schema: Schema, writer: W) -> Self {
        RowPrinter {
            schema,
            writer,
            records: 0,
        }
    }

    fn render(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl<W: Write + Send> PageOutput for RowPrinter<W> {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        let mut text = String::new();
        for record in page.records(&self.schema) {
            let line: Vec<String> = record.values()?.iter().map(Self::render).collect();
            text.push_str(&line.join(","));
            text.push('\n');
            self.records += 1;
        }
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        Ok(self.writer.flush()?)
    }
}

impl<W: Write + Send> TransactionalPageOutput for RowPrinter<W> {
    fn abort(&mut self) {}

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        Ok(TaskReport::new().set("records", self.records as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::CaptureOutput;
    use engine_core::plugin::PageBuilder;
    use model::{buffer::BufferAllocator, core::column_type::ColumnType};

    #[test]
    fn prints_one_line_per_record() {
        let schema = Schema::builder()
            .add("id", ColumnType::Long)
            .add("name", ColumnType::String)
            .build()
            .unwrap();
        let mut printer = RowPrinter::new(schema.clone(), Vec::new());

        let alloc = BufferAllocator::default();
        let mut builder = PageBuilder::new(&alloc, schema, &mut printer);
        builder.set_long(0, 1).unwrap();
        builder.set_string(1, "a").unwrap();
        builder.add_record().unwrap();
        builder.set_long(0, 2).unwrap();
        builder.set_null(1).unwrap();
        builder.add_record().unwrap();
        builder.finish().unwrap();

        let report = printer.commit().unwrap();
        assert_eq!(String::from_utf8(printer.writer).unwrap(), "1,a\n2,\n");
        assert_eq!(report.get::<i64>("records").unwrap(), Some(2));
    }

    #[tokio::test]
    async fn transaction_reports_record_total() {
        let mut control = CaptureOutput(None, vec![TaskReport::new().set("records", 4)]);

        let diff = StdoutOutputPlugin
            .transaction(&ConfigSource::new(), &Schema::builder().build().unwrap(), 1, &mut control)
            .await
            .unwrap();

        assert_eq!(diff.get::<i64>("records").unwrap(), Some(4));
    }
}
