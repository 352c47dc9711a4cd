use crate::{
    core::column_type::ColumnType, error::SchemaError, records::layout::RecordLayout,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, sync::Arc};

pub mod visitor;

pub use visitor::ColumnVisitor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(index: usize, name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            index,
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered, immutable list of columns shared by every stage of a transfer.
///
/// Indices are dense (`0..n`) and names are unique; both are checked when a
/// schema is built or deserialized.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    columns: Vec<Column>,
    layout: RecordLayout,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for (expected, column) in columns.iter().enumerate() {
            if column.index != expected {
                return Err(SchemaError::NonDenseIndex {
                    expected,
                    found: column.index,
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
        }

        let layout = RecordLayout::new(&columns);
        Ok(Schema {
            inner: Arc::new(SchemaInner { columns, layout }),
        })
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.inner.columns
    }

    pub fn len(&self) -> usize {
        self.inner.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.inner.columns.get(index)
    }

    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.column(index).map(|c| c.column_type)
    }

    pub fn lookup(&self, name: &str) -> Option<&Column> {
        self.inner.columns.iter().find(|c| c.name == name)
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.inner.layout
    }

    /// Visits every column in index order, dispatching on its type.
    pub fn visit_columns<V: ColumnVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        self.inner
            .columns
            .iter()
            .try_for_each(|column| column.visit(visitor))
    }

    /// Returns a new schema with columns renamed according to `mapping`.
    pub fn rename<F>(&self, mut mapping: F) -> Result<Schema, SchemaError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let columns = self
            .inner
            .columns
            .iter()
            .map(|c| {
                let name = mapping(&c.name).unwrap_or_else(|| c.name.clone());
                Column::new(c.index, name, c.column_type)
            })
            .collect();
        Schema::new(columns)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.columns == other.inner.columns
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.columns.iter()).finish()
    }
}

impl TryFrom<Vec<Column>> for Schema {
    type Error = SchemaError;

    fn try_from(columns: Vec<Column>) -> Result<Self, Self::Error> {
        Schema::new(columns)
    }
}

impl From<Schema> for Vec<Column> {
    fn from(schema: Schema) -> Self {
        schema.inner.columns.clone()
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn add(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        let index = self.columns.len();
        self.columns.push(Column::new(index, name, column_type));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::new(self.columns)
    }
}
