//! Statement representation
//!
//! The executor consumes statements that have already been parsed. Relations,
//! attributes and conditions are kept in statement order; every ordering rule
//! applied on top of them lives in the executor.

mod ast;

pub use ast::{
    AggreType, AttrDef, AttrRef, CompOp, Condition, CreateIndex, CreateTable, Deletes, Inserts,
    Operand, RelAttr, Selects, Statement,
};
