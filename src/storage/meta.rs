//! Table and index metadata
//!
//! A table's fields are laid out back to back in declaration order. Records
//! are fixed-size byte strings whose length is the sum of the field lengths.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::errors::{StorageError, StorageResult};
use crate::planner::AttrDef;
use crate::types::{AttrType, TupleSchema, Value, ValueError};

/// Default byte length of a `char` column declared without one
pub const DEFAULT_CHAR_LEN: usize = 4;

/// Physical placement of one field inside a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub attr_type: AttrType,
    pub offset: usize,
    pub len: usize,
}

impl FieldMeta {
    /// The field's raw bytes, or `None` if the record is too short
    pub fn slice<'a>(&self, record: &'a [u8]) -> Option<&'a [u8]> {
        record.get(self.offset..self.offset + self.len)
    }

    /// Decodes the field from a raw record
    pub fn decode(&self, record: &[u8]) -> Result<Value, ValueError> {
        let bytes = self.slice(record).ok_or(ValueError::WrongWidth {
            expected: self.offset + self.len,
            actual: record.len(),
        })?;
        Value::decode(self.attr_type, bytes)
    }
}

/// Index declaration: name, key fields in key order, uniqueness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    name: String,
    fields: Vec<FieldMeta>,
    indexes: Vec<IndexMeta>,
    record_size: usize,
}

impl TableMeta {
    /// Lays out `attributes` in declaration order
    pub fn new(name: &str, attributes: &[AttrDef]) -> StorageResult<Self> {
        if !is_identifier(name) {
            return Err(StorageError::invalid_schema(format!(
                "invalid table name '{}'",
                name
            )));
        }
        if attributes.is_empty() {
            return Err(StorageError::invalid_schema(format!(
                "table '{}' has no fields",
                name
            )));
        }

        let mut fields: Vec<FieldMeta> = Vec::with_capacity(attributes.len());
        let mut offset = 0;
        for attr in attributes {
            if !is_identifier(&attr.name) {
                return Err(StorageError::invalid_schema(format!(
                    "invalid field name '{}'",
                    attr.name
                )));
            }
            if fields.iter().any(|f| f.name == attr.name) {
                return Err(StorageError::invalid_schema(format!(
                    "duplicate field '{}' in table '{}'",
                    attr.name, name
                )));
            }
            let len = match attr.attr_type.fixed_width() {
                Some(width) => width,
                None => attr.length.unwrap_or(DEFAULT_CHAR_LEN),
            };
            if len == 0 {
                return Err(StorageError::invalid_schema(format!(
                    "field '{}' has zero length",
                    attr.name
                )));
            }
            fields.push(FieldMeta {
                name: attr.name.clone(),
                attr_type: attr.attr_type,
                offset,
                len,
            });
            offset += len;
        }

        Ok(Self {
            name: name.to_string(),
            fields,
            indexes: Vec::new(),
            record_size: offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn indexes(&self) -> &[IndexMeta] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub(crate) fn add_index(&mut self, meta: IndexMeta) {
        self.indexes.push(meta);
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Field metadata for `names`, in the given order
    pub fn resolve_fields(&self, names: &[String]) -> StorageResult<Vec<FieldMeta>> {
        names
            .iter()
            .map(|n| {
                self.field(n)
                    .cloned()
                    .ok_or_else(|| StorageError::field_missing(&self.name, n))
            })
            .collect()
    }

    /// Builds a raw record from one value per field, in declaration order
    pub fn encode_record(&self, values: &[Value]) -> StorageResult<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(StorageError::invalid_record(format!(
                "table '{}' has {} fields, got {} values",
                self.name,
                self.fields.len(),
                values.len()
            )));
        }
        let mut record = Vec::with_capacity(self.record_size);
        for (field, value) in self.fields.iter().zip(values) {
            let bytes = value
                .coerce_to(field.attr_type)
                .and_then(|v| v.encode(field.len))
                .map_err(|e| StorageError::invalid_value(&field.name, e))?;
            record.extend_from_slice(&bytes);
        }
        Ok(record)
    }

    /// Decodes every field of a raw record
    pub fn decode_record(&self, record: &[u8]) -> StorageResult<Vec<Value>> {
        self.fields
            .iter()
            .map(|f| f.decode(record).map_err(|e| StorageError::invalid_value(&f.name, e)))
            .collect()
    }

    /// Appends every field of this table to `schema`, skipping ones already present
    pub fn append_to_schema(&self, schema: &mut TupleSchema) {
        for field in &self.fields {
            schema.add_if_not_exists(field.attr_type, &self.name, &field.name);
        }
    }

    /// Human-readable layout used by `DESC`
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}(", self.name);
        for field in &self.fields {
            let _ = writeln!(
                out,
                "\tfield name={}, type={}, len={}",
                field.name, field.attr_type, field.len
            );
        }
        for index in &self.indexes {
            let _ = writeln!(
                out,
                "\tindex name={}, fields={}, unique={}",
                index.name,
                index.fields.join(","),
                index.unique
            );
        }
        out.push_str(")\n");
        out
    }
}

/// Plain identifier: a letter or underscore followed by letters, digits or underscores
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
