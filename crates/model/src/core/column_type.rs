use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Logical type of a schema column.
///
/// Every type has a fixed-size slot in the page record layout; string and
/// json slots hold an offset/length pair into the page's variable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Long,
    Double,
    String,
    Timestamp,
    Json,
}

impl ColumnType {
    /// Width of the fixed slot this type occupies in an encoded record.
    pub fn slot_size(&self) -> usize {
        match self {
            ColumnType::Boolean => 1,
            ColumnType::Long | ColumnType::Double => 8,
            // i64 epoch seconds + u32 nanos
            ColumnType::Timestamp => 12,
            // u32 offset + u32 length
            ColumnType::String | ColumnType::Json => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "long" | "int" | "integer" => Ok(ColumnType::Long),
            "double" | "float" => Ok(ColumnType::Double),
            "string" | "text" => Ok(ColumnType::String),
            "timestamp" => Ok(ColumnType::Timestamp),
            "json" => Ok(ColumnType::Json),
            other => Err(format!("Unknown column type: {other}")),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("BOOL".parse::<ColumnType>(), Ok(ColumnType::Boolean));
        assert_eq!("integer".parse::<ColumnType>(), Ok(ColumnType::Long));
        assert_eq!(" Timestamp ".parse::<ColumnType>(), Ok(ColumnType::Timestamp));
        assert!("decimal".parse::<ColumnType>().is_err());
    }

    #[test]
    fn serializes_as_lowercase_name() {
        let json = serde_json::to_string(&ColumnType::Json).unwrap();
        assert_eq!(json, "\"json\"");
    }
}
