//! Index subsystem
//!
//! Persistent ordered indexes over one or more fields of a table.
//!
//! # Design Principles
//!
//! - Keys are the concatenated raw bytes of the indexed fields, in index order
//! - Keys order part by part using each field's type
//! - A key may map to many record ids; uniqueness is enforced above the tree
//! - Scanners yield record ids in key order
//!
//! # Invariants
//!
//! - A handle is either attached to exactly one index file or closed
//! - A rejected unique insert leaves the tree unchanged
//! - `<>` never opens an index scan

mod bplus_index;
mod errors;
mod key;
mod scanner;
mod tree;

pub use bplus_index::{BplusTreeIndex, NULL_KEY};
pub use errors::{IndexError, IndexErrorCode, IndexResult, Severity};
pub use key::{KeyLayout, KeyPart, TreeKey};
pub use scanner::IndexScanner;
pub use tree::{FileTree, OrderedTree, TreeCursor};
