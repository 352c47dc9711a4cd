use crate::core::column_type::ColumnType;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Column indices must be dense: expected index {expected}, found {found}")]
    NonDenseIndex { expected: usize, found: usize },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Column '{column}' is {expected}, cannot store or read it as {found}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    #[error("Column index {index} is out of range for a schema of {len} columns")]
    ColumnOutOfRange { index: usize, len: usize },

    #[error("Record of {0} bytes does not fit the page offset encoding")]
    RecordTooLarge(usize),

    #[error("Failed to encode json value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored timestamp is out of range: {0}s")]
    TimestampOutOfRange(i64),

    #[error("Page data is corrupted: {0}")]
    Corrupted(String),
}
