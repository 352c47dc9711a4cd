use crate::{core::column_type::ColumnType, schema::Column};

/// Per-type callbacks invoked by [`Column::visit`] and
/// [`Schema::visit_columns`](crate::schema::Schema::visit_columns).
///
/// Parsers use a visitor to convert one raw field per column into a typed
/// page value; formatters use one to render the value back to text.
pub trait ColumnVisitor {
    type Error;

    fn boolean_column(&mut self, column: &Column) -> Result<(), Self::Error>;
    fn long_column(&mut self, column: &Column) -> Result<(), Self::Error>;
    fn double_column(&mut self, column: &Column) -> Result<(), Self::Error>;
    fn string_column(&mut self, column: &Column) -> Result<(), Self::Error>;
    fn timestamp_column(&mut self, column: &Column) -> Result<(), Self::Error>;
    fn json_column(&mut self, column: &Column) -> Result<(), Self::Error>;
}

impl Column {
    pub fn visit<V: ColumnVisitor + ?Sized>(&self, visitor: &mut V) -> Result<(), V::Error> {
        match self.column_type {
            ColumnType::Boolean => visitor.boolean_column(self),
            ColumnType::Long => visitor.long_column(self),
            ColumnType::Double => visitor.double_column(self),
            ColumnType::String => visitor.string_column(self),
            ColumnType::Timestamp => visitor.timestamp_column(self),
            ColumnType::Json => visitor.json_column(self),
        }
    }
}
