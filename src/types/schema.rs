//! Result-set schemas
//!
//! A schema is an ordered list of `(table, field, type)` entries. Order is
//! significant: it fixes output column order and the positional layout of every
//! tuple conforming to the schema.

use super::value::AttrType;

/// One column of a result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleField {
    attr_type: AttrType,
    table_name: String,
    field_name: String,
}

impl TupleField {
    pub fn new(
        attr_type: AttrType,
        table_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            attr_type,
            table_name: table_name.into(),
            field_name: field_name.into(),
        }
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// `table.field` header used when several relations share a result set
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table_name, self.field_name)
    }

    fn is(&self, table_name: &str, field_name: &str) -> bool {
        self.table_name == table_name && self.field_name == field_name
    }
}

/// Ordered column list of a result set.
///
/// `(table, field)` uniqueness is not enforced by [`TupleSchema::add`];
/// lookups return the first match. Schema composition goes through
/// [`TupleSchema::add_if_not_exists`] so repeated requests stay idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleSchema {
    fields: Vec<TupleField>,
}

impl TupleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column unconditionally
    pub fn add(&mut self, attr_type: AttrType, table_name: &str, field_name: &str) {
        self.fields
            .push(TupleField::new(attr_type, table_name, field_name));
    }

    /// Appends a column unless `(table, field)` is already present
    pub fn add_if_not_exists(&mut self, attr_type: AttrType, table_name: &str, field_name: &str) {
        if self.index_of_field(table_name, field_name).is_none() {
            self.add(attr_type, table_name, field_name);
        }
    }

    /// Appends every column of `other`, keeping its order
    pub fn append(&mut self, other: &TupleSchema) {
        self.fields.extend(other.fields.iter().cloned());
    }

    /// Position of the first column matching `(table, field)`
    pub fn index_of_field(&self, table_name: &str, field_name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.is(table_name, field_name))
    }

    pub fn fields(&self) -> &[TupleField] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&TupleField> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
