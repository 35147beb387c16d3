//! Query execution
//!
//! # Execution flow
//!
//! 1. Validate that every relation a SELECT names is in its FROM list
//! 2. Build one selection node per relation: schema, bound filters
//! 3. Scan each relation, through an index when a filter allows it
//! 4. One relation: optionally aggregate into a single row
//! 5. Several relations: cross join with the cross-relation conditions
//! 6. Render the result set
//!
//! # Invariants
//!
//! - A construction error aborts the statement before any scan
//! - A per-row error aborts the scan; no partial result is returned
//! - Output columns follow the reverse of the requested attribute order

mod aggregate;
mod errors;
#[allow(clippy::module_inception)]
mod executor;
mod filters;
mod join;
mod selection;

pub use aggregate::aggregate;
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use executor::{Engine, FAILURE, SUCCESS, UNSUPPORTED};
pub use filters::ConditionFilter;
pub use join::{CrossJoin, JoinRows};
pub use selection::{create_selection_executor, SelectionNode};
