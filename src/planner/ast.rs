//! Statement structures consumed by the executor
//!
//! These are produced by the SQL front end (or decoded from JSON statement
//! scripts) and are immutable once built.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AttrType, Value};

/// Comparison operators usable in conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompOp {
    /// Maps a three-way comparison result `left ? right` to the predicate outcome
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            CompOp::Eq => ordering == Ordering::Equal,
            CompOp::Ne => ordering != Ordering::Equal,
            CompOp::Lt => ordering == Ordering::Less,
            CompOp::Le => ordering != Ordering::Greater,
            CompOp::Gt => ordering == Ordering::Greater,
            CompOp::Ge => ordering != Ordering::Less,
        }
    }

    /// Operator with its operands swapped: `a op b` holds iff `b op.flip() a` holds
    pub fn flip(self) -> CompOp {
        match self {
            CompOp::Lt => CompOp::Gt,
            CompOp::Le => CompOp::Ge,
            CompOp::Gt => CompOp::Lt,
            CompOp::Ge => CompOp::Le,
            other => other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Ne => "<>",
            CompOp::Lt => "<",
            CompOp::Le => "<=",
            CompOp::Gt => ">",
            CompOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Aggregate wrapped around a requested attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggreType {
    #[default]
    None,
    Count,
    Min,
    Max,
    Avg,
}

impl AggreType {
    pub fn name(&self) -> &'static str {
        match self {
            AggreType::None => "",
            AggreType::Count => "COUNT",
            AggreType::Min => "MIN",
            AggreType::Max => "MAX",
            AggreType::Avg => "AVG",
        }
    }
}

/// A requested output attribute: `[relation.]attribute`, optionally aggregated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelAttr {
    #[serde(default)]
    pub relation: Option<String>,
    /// Field name, `*`, or for aggregates a numeric literal such as `1`
    pub attribute: String,
    #[serde(default)]
    pub aggregate: AggreType,
}

impl RelAttr {
    /// Unqualified attribute
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            relation: None,
            attribute: attribute.into(),
            aggregate: AggreType::None,
        }
    }

    /// `relation.attribute`
    pub fn qualified(relation: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            relation: Some(relation.into()),
            attribute: attribute.into(),
            aggregate: AggreType::None,
        }
    }

    /// `KIND(attribute)`
    pub fn aggregate(kind: AggreType, attribute: impl Into<String>) -> Self {
        Self {
            relation: None,
            attribute: attribute.into(),
            aggregate: kind,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.attribute == "*"
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate != AggreType::None
    }

    /// Aggregate argument written as a number, as in `COUNT(1)`
    pub fn is_literal(&self) -> bool {
        is_numeric_literal(&self.attribute)
    }

    /// `COUNT(*)` or `COUNT(<number>)`: counts rows without naming a field
    pub fn counts_rows(&self) -> bool {
        self.aggregate == AggreType::Count && (self.is_wildcard() || self.is_literal())
    }

    /// Whether this attribute names the given relation (unqualified names match any)
    pub fn applies_to(&self, table_name: &str) -> bool {
        self.relation.as_deref().map_or(true, |r| r == table_name)
    }

    /// Column header: `MIN(id)` for aggregates, the bare attribute otherwise
    pub fn display_name(&self) -> String {
        if self.is_aggregate() {
            format!("{}({})", self.aggregate.name(), self.attribute)
        } else {
            self.attribute.clone()
        }
    }
}

/// Attribute reference inside a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRef {
    #[serde(default)]
    pub relation: Option<String>,
    pub attribute: String,
}

/// One side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Attr(AttrRef),
    Value(Value),
}

impl Operand {
    pub fn attr(relation: Option<&str>, attribute: impl Into<String>) -> Self {
        Operand::Attr(AttrRef {
            relation: relation.map(str::to_string),
            attribute: attribute.into(),
        })
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }

    pub fn as_attr(&self) -> Option<&AttrRef> {
        match self {
            Operand::Attr(a) => Some(a),
            Operand::Value(_) => None,
        }
    }
}

/// `left op right`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: Operand,
    pub op: CompOp,
    pub right: Operand,
}

impl Condition {
    pub fn new(left: Operand, op: CompOp, right: Operand) -> Self {
        Self { left, op, right }
    }

    /// Both sides are attributes of two different, named relations
    pub fn is_cross_relation(&self) -> bool {
        match (self.left.as_attr(), self.right.as_attr()) {
            (Some(l), Some(r)) => match (&l.relation, &r.relation) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            },
            _ => false,
        }
    }
}

/// SELECT statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selects {
    /// Relations in statement order
    pub relations: Vec<String>,
    /// Requested attributes in statement order.
    ///
    /// Output columns are laid out in the reverse of this order.
    pub attributes: Vec<RelAttr>,
    /// Conjunctive WHERE conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Selects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, relation: impl Into<String>) -> Self {
        self.relations.push(relation.into());
        self
    }

    pub fn attr(mut self, attr: RelAttr) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Any requested attribute is an aggregate
    pub fn is_aggregate(&self) -> bool {
        self.attributes.iter().any(RelAttr::is_aggregate)
    }
}

/// Column declaration in CREATE TABLE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrDef {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttrType,
    /// Byte length for `char`; ignored for fixed-width types
    #[serde(default)]
    pub length: Option<usize>,
}

impl AttrDef {
    pub fn new(name: impl Into<String>, attr_type: AttrType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            length: None,
        }
    }

    pub fn chars(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            attr_type: AttrType::Char,
            length: Some(length),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTable {
    pub name: String,
    pub attributes: Vec<AttrDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    /// Key fields in key order
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inserts {
    pub table: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deletes {
    pub table: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Every statement the dispatcher understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    Select(Selects),
    Insert(Inserts),
    Delete(Deletes),
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    ShowTables,
    DescTable { table: String },
    Sync,
    Begin,
    Commit,
    Rollback,
    Help,
    Exit,
}

impl Statement {
    /// Short name used in log events
    pub fn name(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Delete(_) => "delete",
            Statement::CreateTable(_) => "create_table",
            Statement::CreateIndex(_) => "create_index",
            Statement::ShowTables => "show_tables",
            Statement::DescTable { .. } => "desc_table",
            Statement::Sync => "sync",
            Statement::Begin => "begin",
            Statement::Commit => "commit",
            Statement::Rollback => "rollback",
            Statement::Help => "help",
            Statement::Exit => "exit",
        }
    }
}

/// Accepts an optional sign, digits and at most one decimal point
fn is_numeric_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}
