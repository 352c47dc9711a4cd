use model::{
    core::column_type::ColumnType,
    error::SchemaError,
    schema::{Column, Schema},
};
use serde::{Deserialize, Serialize};

/// One entry of a `columns:` list in parser or input config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// strftime pattern for timestamp columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaConfig {
    pub columns: Vec<ColumnConfig>,
}

impl SchemaConfig {
    pub fn to_schema(&self) -> Result<Schema, SchemaError> {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| Column::new(i, c.name.clone(), c.column_type))
            .collect();
        Schema::new(columns)
    }

    pub fn format_of(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|c| c.format.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_schema_from_column_list() {
        let cfg: SchemaConfig = serde_json::from_str(
            r#"[{"name":"id","type":"long"},{"name":"at","type":"timestamp","format":"%Y-%m-%d"}]"#,
        )
        .unwrap();
        let schema = cfg.to_schema().unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.column_type(1), Some(ColumnType::Timestamp));
        assert_eq!(cfg.format_of(1), Some("%Y-%m-%d"));
    }

    #[test]
    fn duplicate_names_fail() {
        let cfg: SchemaConfig =
            serde_json::from_str(r#"[{"name":"a","type":"long"},{"name":"a","type":"long"}]"#)
                .unwrap();
        assert!(cfg.to_schema().is_err());
    }
}
