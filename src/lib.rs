//! relcore - a small relational engine
//!
//! Per-relation selection with condition filters, single-relation
//! aggregation, N-way cross joins and persistent B+Tree indexes with
//! uniqueness checks, driven by a statement dispatcher with undo-log
//! transactions.

pub mod cli;
pub mod config;
pub mod executor;
pub mod index;
pub mod observability;
pub mod planner;
pub mod session;
pub mod storage;
pub mod types;
