use crate::schema::Column;

/// Size of the `u32` length prefix in front of every record.
pub const RECORD_HEADER_LEN: usize = 4;

/// Byte layout of one encoded record for a given schema:
///
/// ```text
/// u32 record length | null bitmap | fixed slots | variable data
/// ```
///
/// Slot offsets are relative to the start of the record.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    bitmap_len: usize,
    offsets: Vec<usize>,
    fixed_len: usize,
}

impl RecordLayout {
    pub fn new(columns: &[Column]) -> Self {
        let bitmap_len = columns.len().div_ceil(8);
        let mut offsets = Vec::with_capacity(columns.len());
        let mut at = RECORD_HEADER_LEN + bitmap_len;
        for column in columns {
            offsets.push(at);
            at += column.column_type.slot_size();
        }

        RecordLayout {
            bitmap_len,
            offsets,
            fixed_len: at,
        }
    }

    pub fn bitmap_len(&self) -> usize {
        self.bitmap_len
    }

    pub fn bitmap_offset(&self) -> usize {
        RECORD_HEADER_LEN
    }

    pub fn slot_offset(&self, column: usize) -> Option<usize> {
        self.offsets.get(column).copied()
    }

    /// Length of a record whose variable-length columns are all empty or null.
    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }
}
