use crate::{error::PluginError, metrics::Metrics};
use chrono::{DateTime, Utc};
use engine_config::TaskReport;
use model::{
    buffer::BufferAllocator,
    core::value::Value,
    records::{Page, PageWriter},
    schema::Schema,
};
use tracing::warn;

/// Receives pages in emission order.
pub trait PageOutput: Send {
    fn add(&mut self, page: Page) -> Result<(), PluginError>;

    /// Called once after the last page.
    fn finish(&mut self) -> Result<(), PluginError>;

    /// Releases resources. Called on every exit path, after `finish` on
    /// success.
    fn close(&mut self) {}
}

/// The sink end of a task chain. Exactly one of `commit` or `abort` is
/// called after the pages were delivered.
pub trait TransactionalPageOutput: PageOutput {
    fn abort(&mut self);

    fn commit(&mut self) -> Result<TaskReport, PluginError>;
}

/// Borrows a transactional output as a plain page output so filters can
/// wrap it while the caller keeps the commit/abort handle.
pub struct TransactionalOutputRef<'a>(pub &'a mut dyn TransactionalPageOutput);

impl PageOutput for TransactionalOutputRef<'_> {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        self.0.add(page)
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        self.0.finish()
    }
}

impl<T: PageOutput + ?Sized> PageOutput for Box<T> {
    fn add(&mut self, page: Page) -> Result<(), PluginError> {
        (**self).add(page)
    }

    fn finish(&mut self) -> Result<(), PluginError> {
        (**self).finish()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Builds records into pages and hands every filled page to an output.
///
/// Dropping the builder flushes records added but not yet emitted, so the
/// pending buffer is released exactly once on every path.
pub struct PageBuilder<'a> {
    writer: PageWriter,
    output: &'a mut dyn PageOutput,
    metrics: Option<Metrics>,
    closed: bool,
}

impl<'a> PageBuilder<'a> {
    pub fn new(allocator: &BufferAllocator, schema: Schema, output: &'a mut dyn PageOutput) -> Self {
        PageBuilder {
            writer: PageWriter::new(schema, allocator.clone()),
            output,
            metrics: None,
            closed: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn schema(&self) -> &Schema {
        self.writer.schema()
    }

    pub fn set_null(&mut self, column: usize) -> Result<(), PluginError> {
        Ok(self.writer.set_null(column)?)
    }

    pub fn set_boolean(&mut self, column: usize, value: bool) -> Result<(), PluginError> {
        Ok(self.writer.set_boolean(column, value)?)
    }

    pub fn set_long(&mut self, column: usize, value: i64) -> Result<(), PluginError> {
        Ok(self.writer.set_long(column, value)?)
    }

    pub fn set_double(&mut self, column: usize, value: f64) -> Result<(), PluginError> {
        Ok(self.writer.set_double(column, value)?)
    }

    pub fn set_string(&mut self, column: usize, value: &str) -> Result<(), PluginError> {
        Ok(self.writer.set_string(column, value)?)
    }

    pub fn set_timestamp(&mut self, column: usize, value: DateTime<Utc>) -> Result<(), PluginError> {
        Ok(self.writer.set_timestamp(column, value)?)
    }

    pub fn set_json(&mut self, column: usize, value: &serde_json::Value) -> Result<(), PluginError> {
        Ok(self.writer.set_json(column, value)?)
    }

    pub fn set_value(&mut self, column: usize, value: &Value) -> Result<(), PluginError> {
        Ok(self.writer.set_value(column, value)?)
    }

    pub fn add_record(&mut self) -> Result<(), PluginError> {
        if let Some(page) = self.writer.add_record()? {
            self.emit(page)?;
        }
        Ok(())
    }

    /// Emits the partially filled page, if any.
    pub fn flush(&mut self) -> Result<(), PluginError> {
        match self.writer.flush() {
            Some(page) => self.emit(page),
            None => Ok(()),
        }
    }

    /// Flushes pending records. The downstream `finish` is left to the
    /// caller that owns the output chain.
    pub fn finish(mut self) -> Result<(), PluginError> {
        self.closed = true;
        self.flush()
    }

    /// Discards the builder after flushing, logging a flush failure.
    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.flush() {
            warn!(error = %err, "Failed to flush pending page on close");
        }
    }

    fn emit(&mut self, page: Page) -> Result<(), PluginError> {
        if let Some(metrics) = &self.metrics {
            metrics.increment_pages(1);
            metrics.increment_records(page.record_count() as u64);
            metrics.increment_bytes(page.byte_len() as u64);
        }
        self.output.add(page)
    }
}

impl Drop for PageBuilder<'_> {
    fn drop(&mut self) {
        self.close_inner();
    }
}
