//! Tuple and schema model
//!
//! Typed values, result-set schemas, rows and result sets. Everything here is
//! value-owned: rows are copied between pipeline stages, never shared.

mod schema;
mod tuple;
mod value;

pub use schema::{TupleField, TupleSchema};
pub use tuple::{Tuple, TupleSet, COLUMN_SEPARATOR};
pub use value::{
    format_float, parse_date, round_to_cents, AttrType, Value, ValueError, FIXED_WIDTH,
};
