//! Rows and result sets

use std::fmt::Write;

use super::schema::TupleSchema;
use super::value::Value;

/// Column separator of the textual rendering
pub const COLUMN_SEPARATOR: &str = " | ";

/// A row: values positionally aligned with some schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// A schema plus the rows produced by one pipeline stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TupleSet {
    schema: TupleSchema,
    tuples: Vec<Tuple>,
}

impl TupleSet {
    pub fn new(schema: TupleSchema) -> Self {
        Self {
            schema,
            tuples: Vec::new(),
        }
    }

    pub fn schema(&self) -> &TupleSchema {
        &self.schema
    }

    /// Appends a row.
    ///
    /// Callers guarantee the row has one value per schema column.
    pub fn add(&mut self, tuple: Tuple) {
        debug_assert_eq!(tuple.len(), self.schema.len());
        self.tuples.push(tuple);
    }

    pub fn get(&self, index: usize) -> Option<&Tuple> {
        self.tuples.get(index)
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Renders the header line followed by one line per row.
    ///
    /// Headers are bare field names, or `table.field` when `with_table_name`
    /// is set. A set with no columns renders as the empty string.
    pub fn render(&self, with_table_name: bool) -> String {
        let mut out = String::new();
        if self.schema.is_empty() {
            return out;
        }

        let header: Vec<String> = self
            .schema
            .fields()
            .iter()
            .map(|f| {
                if with_table_name {
                    f.qualified_name()
                } else {
                    f.field_name().to_string()
                }
            })
            .collect();
        out.push_str(&header.join(COLUMN_SEPARATOR));
        out.push('\n');

        for tuple in &self.tuples {
            for (i, value) in tuple.values().iter().enumerate() {
                if i > 0 {
                    out.push_str(COLUMN_SEPARATOR);
                }
                let _ = write!(out, "{}", value);
            }
            out.push('\n');
        }
        out
    }
}
