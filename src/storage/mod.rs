//! Table storage and catalog
//!
//! Holds table metadata, the record layout, the per-table record heap and the
//! catalog of databases. Table contents live in memory; index files are the
//! only on-disk state.
//!
//! # Invariants
//!
//! - A record is exactly `record_size` bytes, fields back to back in declaration order
//! - A stored record has an entry in every index of its table
//! - A `Rid` is never reused within a table

mod errors;
mod handler;
mod meta;
mod record;
mod table;

pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use handler::Handler;
pub use meta::{is_identifier, FieldMeta, IndexMeta, TableMeta, DEFAULT_CHAR_LEN};
pub use record::Rid;
pub use table::{Table, PAGE_SLOTS};
