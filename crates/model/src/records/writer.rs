use crate::{
    buffer::{BufferAllocator, PooledBuffer},
    core::{column_type::ColumnType, value::Value},
    error::PageError,
    records::page::Page,
    schema::Schema,
};
use bytes::BufMut;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
enum Staged {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    Timestamp { secs: i64, nanos: u32 },
    Var { start: usize, len: usize },
}

/// Encodes records into pages, one open record at a time.
///
/// Setters stage values for the current record; `add_record` encodes it into
/// the current page buffer. When a record does not fit, the filled page is
/// returned and encoding continues on a fresh buffer. Columns left unset are
/// null, and setting a column twice keeps the last value.
pub struct PageWriter {
    schema: Schema,
    allocator: BufferAllocator,
    current: Option<PooledBuffer>,
    record_count: usize,
    staged: Vec<Staged>,
    scratch: Vec<u8>,
}

impl PageWriter {
    pub fn new(schema: Schema, allocator: BufferAllocator) -> Self {
        let staged = vec![Staged::Null; schema.len()];
        PageWriter {
            schema,
            allocator,
            current: None,
            record_count: 0,
            staged,
            scratch: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn set_null(&mut self, column: usize) -> Result<(), PageError> {
        self.column_type(column)?;
        self.staged[column] = Staged::Null;
        Ok(())
    }

    pub fn set_boolean(&mut self, column: usize, value: bool) -> Result<(), PageError> {
        self.check(column, ColumnType::Boolean)?;
        self.staged[column] = Staged::Boolean(value);
        Ok(())
    }

    pub fn set_long(&mut self, column: usize, value: i64) -> Result<(), PageError> {
        self.check(column, ColumnType::Long)?;
        self.staged[column] = Staged::Long(value);
        Ok(())
    }

    pub fn set_double(&mut self, column: usize, value: f64) -> Result<(), PageError> {
        self.check(column, ColumnType::Double)?;
        self.staged[column] = Staged::Double(value);
        Ok(())
    }

    pub fn set_timestamp(&mut self, column: usize, value: DateTime<Utc>) -> Result<(), PageError> {
        self.check(column, ColumnType::Timestamp)?;
        self.staged[column] = Staged::Timestamp {
            secs: value.timestamp(),
            nanos: value.timestamp_subsec_nanos(),
        };
        Ok(())
    }

    pub fn set_string(&mut self, column: usize, value: &str) -> Result<(), PageError> {
        self.check(column, ColumnType::String)?;
        let start = self.scratch.len();
        self.scratch.extend_from_slice(value.as_bytes());
        self.staged[column] = Staged::Var {
            start,
            len: value.len(),
        };
        Ok(())
    }

    pub fn set_json(&mut self, column: usize, value: &serde_json::Value) -> Result<(), PageError> {
        self.check(column, ColumnType::Json)?;
        let start = self.scratch.len();
        serde_json::to_writer(&mut self.scratch, value)?;
        self.staged[column] = Staged::Var {
            start,
            len: self.scratch.len() - start,
        };
        Ok(())
    }

    /// Stages an owned value, checking it against the column type.
    pub fn set_value(&mut self, column: usize, value: &Value) -> Result<(), PageError> {
        match value {
            Value::Null => self.set_null(column),
            Value::Boolean(v) => self.set_boolean(column, *v),
            Value::Long(v) => self.set_long(column, *v),
            Value::Double(v) => self.set_double(column, *v),
            Value::String(v) => self.set_string(column, v),
            Value::Timestamp(v) => self.set_timestamp(column, *v),
            Value::Json(v) => self.set_json(column, v),
        }
    }

    /// Encodes the staged record. Returns the previous page when the record
    /// did not fit into it.
    pub fn add_record(&mut self) -> Result<Option<Page>, PageError> {
        let var_len: usize = self
            .staged
            .iter()
            .map(|s| match s {
                Staged::Var { len, .. } => *len,
                _ => 0,
            })
            .sum();
        let record_len = self.schema.layout().fixed_len() + var_len;
        if record_len > u32::MAX as usize {
            return Err(PageError::RecordTooLarge(record_len));
        }

        let page_size = self.allocator.page_size();
        let mut emitted = None;
        if let Some(buf) = &self.current {
            if self.record_count > 0 && buf.len() + record_len > page_size {
                emitted = self.take_page();
            }
        }

        let allocator = &self.allocator;
        let buf = self.current.get_or_insert_with(|| {
            if record_len > page_size {
                allocator.acquire_with_capacity(record_len)
            } else {
                allocator.acquire()
            }
        });

        let base = buf.len();
        if base + record_len > u32::MAX as usize {
            return Err(PageError::RecordTooLarge(record_len));
        }
        encode_record(buf, &self.staged, &self.scratch, &self.schema, base, record_len);

        self.record_count += 1;
        self.staged.fill(Staged::Null);
        self.scratch.clear();
        Ok(emitted)
    }

    /// Emits the current page if it holds any record. An empty buffer is
    /// released instead.
    pub fn flush(&mut self) -> Option<Page> {
        if self.record_count == 0 {
            self.current = None;
            return None;
        }
        self.take_page()
    }

    fn take_page(&mut self) -> Option<Page> {
        let buffer = self.current.take()?;
        let page = Page::new(buffer, self.record_count);
        self.record_count = 0;
        Some(page)
    }

    fn column_type(&self, column: usize) -> Result<ColumnType, PageError> {
        self.schema
            .column_type(column)
            .ok_or(PageError::ColumnOutOfRange {
                index: column,
                len: self.schema.len(),
            })
    }

    fn check(&self, column: usize, requested: ColumnType) -> Result<(), PageError> {
        let actual = self.column_type(column)?;
        if actual != requested {
            return Err(PageError::TypeMismatch {
                column: self.schema.columns()[column].name.clone(),
                expected: actual,
                found: requested,
            });
        }
        Ok(())
    }
}

fn encode_record(
    buf: &mut PooledBuffer,
    staged: &[Staged],
    scratch: &[u8],
    schema: &Schema,
    base: usize,
    record_len: usize,
) {
    let layout = schema.layout();
    buf.reserve(record_len);
    buf.put_u32_le(record_len as u32);

    let mut bitmap = vec![0u8; layout.bitmap_len()];
    for (i, value) in staged.iter().enumerate() {
        if matches!(value, Staged::Null) {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    buf.put_slice(&bitmap);

    let mut var_at = base + layout.fixed_len();
    for (value, column) in staged.iter().zip(schema.columns()) {
        match *value {
            // null slots keep their width so offsets stay fixed
            Staged::Null => buf.put_bytes(0, column.column_type.slot_size()),
            Staged::Boolean(v) => buf.put_u8(v as u8),
            Staged::Long(v) => buf.put_i64_le(v),
            Staged::Double(v) => buf.put_f64_le(v),
            Staged::Timestamp { secs, nanos } => {
                buf.put_i64_le(secs);
                buf.put_u32_le(nanos);
            }
            Staged::Var { len, .. } => {
                buf.put_u32_le(var_at as u32);
                buf.put_u32_le(len as u32);
                var_at += len;
            }
        }
    }

    for value in staged {
        if let Staged::Var { start, len } = *value {
            buf.put_slice(&scratch[start..start + len]);
        }
    }
}
