use crate::{
    buffer::PooledBuffer,
    core::{column_type::ColumnType, value::Value},
    error::PageError,
    records::layout::RECORD_HEADER_LEN,
    schema::Schema,
};
use chrono::{DateTime, Utc};
use std::fmt;

/// A batch of encoded records backed by one pooled buffer.
///
/// Pages are produced by [`PageWriter`](crate::records::PageWriter) and are
/// read-only once built. Dropping a page returns its buffer to the pool.
pub struct Page {
    buffer: PooledBuffer,
    record_count: usize,
}

impl Page {
    pub(crate) fn new(buffer: PooledBuffer, record_count: usize) -> Self {
        Page {
            buffer,
            record_count,
        }
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Iterates the records of this page in insertion order.
    pub fn records<'a>(&'a self, schema: &'a Schema) -> PageReader<'a> {
        PageReader {
            data: &self.buffer,
            schema,
            pos: 0,
            remaining: self.record_count,
        }
    }

    /// Decodes every record into owned values. Meant for tests and small
    /// diagnostic outputs.
    pub fn to_values(&self, schema: &Schema) -> Result<Vec<Vec<Value>>, PageError> {
        self.records(schema).map(|r| r.values()).collect()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("record_count", &self.record_count)
            .field("bytes", &self.buffer.len())
            .finish()
    }
}

pub struct PageReader<'a> {
    data: &'a [u8],
    schema: &'a Schema,
    pos: usize,
    remaining: usize,
}

impl<'a> Iterator for PageReader<'a> {
    type Item = RecordView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let header = self.data.get(self.pos..self.pos + RECORD_HEADER_LEN)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if len < RECORD_HEADER_LEN || self.pos + len > self.data.len() {
            return None;
        }

        let view = RecordView {
            data: self.data,
            start: self.pos,
            schema: self.schema,
        };
        self.pos += len;
        self.remaining -= 1;
        Some(view)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Zero-copy accessor over one encoded record.
#[derive(Clone, Copy)]
pub struct RecordView<'a> {
    data: &'a [u8],
    start: usize,
    schema: &'a Schema,
}

impl<'a> RecordView<'a> {
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn is_null(&self, column: usize) -> bool {
        let at = self.start + self.schema.layout().bitmap_offset() + column / 8;
        self.data
            .get(at)
            .is_some_and(|byte| byte & (1 << (column % 8)) != 0)
    }

    pub fn get_boolean(&self, column: usize) -> Result<Option<bool>, PageError> {
        self.read_slot::<1>(column, ColumnType::Boolean)
            .map(|slot| slot.map(|[b]| b != 0))
    }

    pub fn get_long(&self, column: usize) -> Result<Option<i64>, PageError> {
        self.read_slot::<8>(column, ColumnType::Long)
            .map(|slot| slot.map(i64::from_le_bytes))
    }

    pub fn get_double(&self, column: usize) -> Result<Option<f64>, PageError> {
        self.read_slot::<8>(column, ColumnType::Double)
            .map(|slot| slot.map(f64::from_le_bytes))
    }

    pub fn get_timestamp(&self, column: usize) -> Result<Option<DateTime<Utc>>, PageError> {
        let Some(slot) = self.read_slot::<12>(column, ColumnType::Timestamp)? else {
            return Ok(None);
        };
        let secs = i64::from_le_bytes(slot[..8].try_into().map_err(corrupted)?);
        let nanos = u32::from_le_bytes(slot[8..].try_into().map_err(corrupted)?);
        DateTime::from_timestamp(secs, nanos)
            .map(Some)
            .ok_or(PageError::TimestampOutOfRange(secs))
    }

    pub fn get_string(&self, column: usize) -> Result<Option<&'a str>, PageError> {
        self.read_var(column, ColumnType::String)?
            .map(|bytes| std::str::from_utf8(bytes).map_err(corrupted))
            .transpose()
    }

    /// Raw JSON text of a json column.
    pub fn get_json_str(&self, column: usize) -> Result<Option<&'a str>, PageError> {
        self.read_var(column, ColumnType::Json)?
            .map(|bytes| std::str::from_utf8(bytes).map_err(corrupted))
            .transpose()
    }

    pub fn get_json(&self, column: usize) -> Result<Option<serde_json::Value>, PageError> {
        self.read_var(column, ColumnType::Json)?
            .map(|bytes| serde_json::from_slice(bytes).map_err(PageError::from))
            .transpose()
    }

    /// Decodes a column into an owned [`Value`].
    pub fn value(&self, column: usize) -> Result<Value, PageError> {
        let column_type = self.column_type(column)?;
        let value = match column_type {
            ColumnType::Boolean => self.get_boolean(column)?.into(),
            ColumnType::Long => self.get_long(column)?.into(),
            ColumnType::Double => self.get_double(column)?.into(),
            ColumnType::String => self.get_string(column)?.into(),
            ColumnType::Timestamp => self.get_timestamp(column)?.into(),
            ColumnType::Json => self.get_json(column)?.map_or(Value::Null, Value::Json),
        };
        Ok(value)
    }

    pub fn values(&self) -> Result<Vec<Value>, PageError> {
        (0..self.schema.len()).map(|i| self.value(i)).collect()
    }

    fn column_type(&self, column: usize) -> Result<ColumnType, PageError> {
        self.schema
            .column_type(column)
            .ok_or(PageError::ColumnOutOfRange {
                index: column,
                len: self.schema.len(),
            })
    }

    fn check(&self, column: usize, requested: ColumnType) -> Result<usize, PageError> {
        let actual = self.column_type(column)?;
        if actual != requested {
            return Err(PageError::TypeMismatch {
                column: self.schema.columns()[column].name.clone(),
                expected: actual,
                found: requested,
            });
        }
        self.schema
            .layout()
            .slot_offset(column)
            .map(|offset| self.start + offset)
            .ok_or(PageError::ColumnOutOfRange {
                index: column,
                len: self.schema.len(),
            })
    }

    fn read_slot<const N: usize>(
        &self,
        column: usize,
        requested: ColumnType,
    ) -> Result<Option<[u8; N]>, PageError> {
        let at = self.check(column, requested)?;
        if self.is_null(column) {
            return Ok(None);
        }
        read_array::<N>(self.data, at).map(Some)
    }

    fn read_var(&self, column: usize, requested: ColumnType) -> Result<Option<&'a [u8]>, PageError> {
        let Some(slot) = self.read_slot::<8>(column, requested)? else {
            return Ok(None);
        };
        let offset = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]) as usize;
        let len = u32::from_le_bytes([slot[4], slot[5], slot[6], slot[7]]) as usize;
        self.data
            .get(offset..offset + len)
            .map(Some)
            .ok_or_else(|| PageError::Corrupted(format!("variable slot {offset}+{len} out of bounds")))
    }
}

impl fmt::Debug for RecordView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for i in 0..self.schema.len() {
            match self.value(i) {
                Ok(v) => list.entry(&v),
                Err(e) => list.entry(&e.to_string()),
            };
        }
        list.finish()
    }
}

fn read_array<const N: usize>(data: &[u8], at: usize) -> Result<[u8; N], PageError> {
    data.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| PageError::Corrupted(format!("slot at {at} out of bounds")))
}

fn corrupted(err: impl fmt::Display) -> PageError {
    PageError::Corrupted(err.to_string())
}
