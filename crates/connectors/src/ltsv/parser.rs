use crate::{
    ltsv::tokenizer::{LtsvTokenizer, split_fields},
    timestamp,
};
use async_trait::async_trait;
use engine_config::{ConfigSource, FieldKind, FieldSpec, TaskShape, TaskSource, schema_config::SchemaConfig};
use engine_core::{
    context::TaskContext,
    error::PluginError,
    plugin::{FileInput, PageBuilder, PageOutput, ParserControl, ParserPlugin},
    util::Newline,
};
use model::schema::{Column, ColumnVisitor, Schema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const TRUE_STRINGS: &[&str] = &[
    "true", "True", "TRUE", "yes", "Yes", "YES", "y", "Y", "on", "On", "ON", "1",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LtsvTask {
    columns: SchemaConfig,
    #[serde(default = "default_null_string")]
    null_string: Option<String>,
    #[serde(default)]
    allow_irregular_column_order: bool,
    #[serde(default)]
    newline: Newline,
}

fn default_null_string() -> Option<String> {
    Some("null".to_string())
}

impl TaskShape for LtsvTask {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("columns", FieldKind::Array).typed::<SchemaConfig>(),
        FieldSpec::optional("null_string", FieldKind::String),
        FieldSpec::optional("allow_irregular_column_order", FieldKind::Bool),
        FieldSpec::optional("newline", FieldKind::String).typed::<Newline>(),
    ];
}

/// Parses LTSV lines into records of the configured `columns`.
///
/// Fields are matched to columns by position unless
/// `allow_irregular_column_order` is set, in which case they are looked up by
/// label. A missing field, an empty value and `null_string` all become null.
pub struct LtsvParserPlugin;

#[async_trait]
impl ParserPlugin for LtsvParserPlugin {
    async fn transaction(
        &self,
        config: &ConfigSource,
        control: &mut dyn ParserControl,
    ) -> Result<(), PluginError> {
        let task: LtsvTask = config.load_config()?;
        let schema = task.columns.to_schema()?;
        debug!(columns = schema.len(), "Parsed LTSV column list");
        control.run(TaskSource::dump(&task)?, schema).await
    }

    fn run(
        &self,
        task: &TaskSource,
        schema: &Schema,
        input: &mut dyn FileInput,
        output: &mut dyn PageOutput,
        ctx: &TaskContext,
    ) -> Result<(), PluginError> {
        let task: LtsvTask = task.load_task()?;
        let mut tokenizer = LtsvTokenizer::new(input, task.newline);
        let mut builder = PageBuilder::new(ctx.allocator(), schema.clone(), output)
            .with_metrics(ctx.metrics().clone());

        while tokenizer.next_file()? {
            let mut records = 0usize;
            while let Some(line) = tokenizer.next_record()? {
                let fields = split_fields(&line)?;
                let mut visitor = RecordVisitor::new(&task, &fields, &mut builder);
                schema.visit_columns(&mut visitor)?;
                builder.add_record()?;
                records += 1;
            }
            builder.flush()?;
            debug!(task_index = ctx.task_index(), records, "Parsed LTSV file");
        }
        builder.finish()
    }
}

enum Lookup<'f> {
    Positional(&'f [(&'f str, &'f str)]),
    ByLabel(HashMap<&'f str, &'f str>),
}

/// Writes one record's fields into the page builder, column by column.
struct RecordVisitor<'r, 'f, 'b> {
    task: &'r LtsvTask,
    fields: Lookup<'f>,
    builder: &'r mut PageBuilder<'b>,
}

impl<'r, 'f, 'b> RecordVisitor<'r, 'f, 'b> {
    fn new(task: &'r LtsvTask, fields: &'f [(&'f str, &'f str)], builder: &'r mut PageBuilder<'b>) -> Self {
        let fields = if task.allow_irregular_column_order {
            Lookup::ByLabel(fields.iter().copied().collect())
        } else {
            Lookup::Positional(fields)
        };
        RecordVisitor {
            task,
            fields,
            builder,
        }
    }

    fn value(&self, column: &Column) -> Option<&'f str> {
        let raw = match &self.fields {
            Lookup::Positional(fields) => fields.get(column.index).map(|(_, v)| *v),
            Lookup::ByLabel(fields) => fields.get(column.name.as_str()).copied(),
        }?;
        if raw.is_empty() || self.task.null_string.as_deref() == Some(raw) {
            None
        } else {
            Some(raw)
        }
    }

    fn parse_with<T, E: std::fmt::Display>(
        &mut self,
        column: &Column,
        parse: impl FnOnce(&str) -> Result<T, E>,
        set: impl FnOnce(&mut PageBuilder<'b>, usize, T) -> Result<(), PluginError>,
    ) -> Result<(), PluginError> {
        let Some(raw) = self.value(column) else {
            return self.builder.set_null(column.index);
        };
        let value = parse(raw).map_err(|e| {
            PluginError::InvalidRecord(format!(
                "column '{}' ({}): cannot parse '{raw}': {e}",
                column.name, column.column_type
            ))
        })?;
        set(&mut *self.builder, column.index, value)
    }
}

impl ColumnVisitor for RecordVisitor<'_, '_, '_> {
    type Error = PluginError;

    fn boolean_column(&mut self, column: &Column) -> Result<(), PluginError> {
        match self.value(column) {
            Some(raw) => self.builder.set_boolean(column.index, TRUE_STRINGS.contains(&raw)),
            None => self.builder.set_null(column.index),
        }
    }

    fn long_column(&mut self, column: &Column) -> Result<(), PluginError> {
        self.parse_with(column, str::parse::<i64>, |b, i, v| b.set_long(i, v))
    }

    fn double_column(&mut self, column: &Column) -> Result<(), PluginError> {
        self.parse_with(column, str::parse::<f64>, |b, i, v| b.set_double(i, v))
    }

    fn string_column(&mut self, column: &Column) -> Result<(), PluginError> {
        match self.value(column) {
            Some(raw) => self.builder.set_string(column.index, raw),
            None => self.builder.set_null(column.index),
        }
    }

    fn timestamp_column(&mut self, column: &Column) -> Result<(), PluginError> {
        let task = self.task;
        let format = task.columns.format_of(column.index);
        self.parse_with(column, |raw| timestamp::parse(raw, format), |b, i, v| {
            b.set_timestamp(i, v)
        })
    }

    fn json_column(&mut self, column: &Column) -> Result<(), PluginError> {
        self.parse_with(
            column,
            |raw| serde_json::from_str::<serde_json::Value>(raw),
            |b, i, v| b.set_json(i, &v),
        )
    }
}
