use crate::{error::FileError, timestamp};
use async_trait::async_trait;
use csv::{Terminator, Writer, WriterBuilder};
use engine_config::{
    ConfigError, ConfigSource, ConfigValidationError, FieldKind, FieldSpec, TaskReport, TaskShape,
    TaskSource,
};
use engine_core::{
    error::PluginError,
    plugin::{
        FormatterControl, FormatterPlugin, PageOutput, TransactionalFileOutput,
        TransactionalPageOutput,
    },
    util::Newline,
};
use model::{
    records::{Page, RecordView},
    schema::{Column, ColumnVisitor, Schema},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ColumnOption {
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CsvFormatterTask {
    #[serde(default = "default_delimiter")]
    delimiter: String,
    #[serde(default = "default_header_line")]
    header_line: bool,
    #[serde(default)]
    null_string: String,
    #[serde(default = "default_newline")]
    newline: Newline,
    #[serde(default)]
    column_options: BTreeMap<String, ColumnOption>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_header_line() -> bool {
    true
}

fn default_newline() -> Newline {
    Newline::Crlf
}

impl TaskShape for CsvFormatterTask {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("delimiter", FieldKind::String),
        FieldSpec::optional("header_line", FieldKind::Bool),
        FieldSpec::optional("null_string", FieldKind::String),
        FieldSpec::optional("newline", FieldKind::String).typed::<Newline>(),
        FieldSpec::optional("column_options", FieldKind::Object)
            .typed::<BTreeMap<String, ColumnOption>>(),
    ];
}

impl CsvFormatterTask {
    fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ConfigValidationError {
                violations: vec![format!(
                    "delimiter must be a single byte, found '{}'",
                    self.delimiter
                )],
            }
            .into()),
        }
    }

    fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        self.delimiter_byte()?;
        let unknown: Vec<String> = self
            .column_options
            .keys()
            .filter(|name| schema.lookup(name).is_none())
            .map(|name| format!("column_options refers to unknown column '{name}'"))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError { violations: unknown }.into())
        }
    }

    fn format_of(&self, column: &Column) -> Option<String> {
        self.column_options
            .get(&column.name)
            .and_then(|option| option.format.clone())
    }
}

/// Renders records as CSV through the `csv` crate. Values are quoted only
/// when needed; nulls become `null_string`.
pub struct CsvFormatterPlugin;

#[async_trait]
impl FormatterPlugin for CsvFormatterPlugin {
    async fn transaction(
        &self,
        config: &ConfigSource,
        schema: &Schema,
        control: &mut dyn FormatterControl,
    ) -> Result<(), PluginError> {
        let task: CsvFormatterTask = config.load_config()?;
        task.validate(schema)?;
        control.run(TaskSource::dump(&task)?).await
    }

    fn open(
        &self,
        task: &TaskSource,
        schema: &Schema,
        output: Box<dyn TransactionalFileOutput>,
    ) -> Result<Box<dyn TransactionalPageOutput>, PluginError> {
        let task: CsvFormatterTask = task.load_task()?;
        let terminator = match task.newline {
            Newline::Crlf => Terminator::CRLF,
            Newline::Lf => Terminator::Any(b'\n'),
            Newline::Cr => Terminator::Any(b'\r'),
        };
        let mut csv = WriterBuilder::new();
        csv.delimiter(task.delimiter_byte()?).terminator(terminator);
        let formats = schema.columns().iter().map(|c| task.format_of(c)).collect();

        let mut out = CsvPageOutput {
            schema: schema.clone(),
            null_string: task.null_string,
            formats,
            csv,
            output,
        };
        out.output.next_file()?;
        if task.header_line {
            let header = out.render(|writer, schema| {
                writer.write_record(schema.columns().iter().map(|c| c.name.as_str()))
            })?;
            out.output.add(&header)?;
        }
        Ok(Box::new(out))
    }
}

struct CsvPageOutput {
    schema: Schema,
    null_string: String,
    formats: Vec<Option<String>>,
    csv: WriterBuilder,
    output: Box<dyn TransactionalFileOutput>,
}

impl CsvPageOutput {
    /// Runs `write` against a csv writer over a fresh buffer and returns the
    /// bytes it produced.
    fn render<F>(&self, write: F) -> Result<Vec<u8>, PluginError>
    where
        F: FnOnce(&mut Writer<&mut Vec<u8>>, &Schema) -> Result<(), csv::Error>,
    {
        let mut buf = Vec::new();
        let mut writer = self.csv.from_writer(&mut buf);
        write(&mut writer, &self.schema).map_err(FileError::from)?;
        writer.flush()?;
        drop(writer);
        Ok(buf)
    }
}

impl PageOutput for CsvPageOutput {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        let mut rows = Vec::with_capacity(page.record_count());
        for record in page.records(&self.schema) {
            let mut row = Vec::with_capacity(self.schema.len());
            let mut render = RenderVisitor {
                record: &record,
                formats: &self.formats,
                null_string: &self.null_string,
                row: &mut row,
            };
            self.schema.visit_columns(&mut render)?;
            rows.push(row);
        }

        let bytes = self.render(|writer, _| rows.iter().try_for_each(|row| writer.write_record(row)))?;
        debug!(records = rows.len(), bytes = bytes.len(), "Formatted page as CSV");
        self.output.add(&bytes)
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        self.output.finish()
    }

    fn close(&mut self) {
        self.output.close()
    }
}

impl TransactionalPageOutput for CsvPageOutput {
    fn abort(&mut self) {
        self.output.abort()
    }

    fn commit(&mut self) -> Result<TaskReport, PluginError> {
        self.output.commit()
    }
}

/// Renders one record into text fields.
struct RenderVisitor<'a, 'p> {
    record: &'a RecordView<'p>,
    formats: &'a [Option<String>],
    null_string: &'a str,
    row: &'a mut Vec<String>,
}

impl RenderVisitor<'_, '_> {
    fn push(&mut self, value: Option<String>) {
        self.row
            .push(value.unwrap_or_else(|| self.null_string.to_string()));
    }
}

impl ColumnVisitor for RenderVisitor<'_, '_> {
    type Error = PluginError;

    fn boolean_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let value = self.record.get_boolean(column.index)?;
        self.push(value.map(|v| v.to_string()));
        Ok(())
    }

    fn long_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let value = self.record.get_long(column.index)?;
        self.push(value.map(|v| v.to_string()));
        Ok(())
    }

    fn double_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let value = self.record.get_double(column.index)?;
        self.push(value.map(|v| v.to_string()));
        Ok(())
    }

    fn string_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let value = self.record.get_string(column.index)?;
        self.push(value.map(str::to_string));
        Ok(())
    }

    fn timestamp_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let format = self.formats.get(column.index).and_then(|f| f.as_deref());
        let value = match self.record.get_timestamp(column.index)? {
            Some(ts) => Some(timestamp::format(&ts, format)?),
            None => None,
        };
        self.push(value);
        Ok(())
    }

    fn json_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let value = self.record.get_json_str(column.index)?;
        self.push(value.map(str::to_string));
        Ok(())
    }
}
