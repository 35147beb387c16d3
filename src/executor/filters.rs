//! Condition filters bound to one table's record layout
//!
//! A filter is compiled once per statement: attribute operands are resolved to
//! byte ranges and literals are converted up front. Evaluation decodes the
//! bound fields of a raw record and compares with `Value::compare`.

use crate::planner::{CompOp, Condition, Operand};
use crate::storage::{FieldMeta, TableMeta};
use crate::types::{AttrType, Value};

use super::errors::{ExecutorError, ExecutorResult};

#[derive(Debug, Clone)]
enum Side {
    Field(FieldMeta),
    Literal(Value),
}

impl Side {
    fn attr_type(&self) -> AttrType {
        match self {
            Side::Field(f) => f.attr_type,
            Side::Literal(v) => v.attr_type(),
        }
    }

    fn value(&self, record: &[u8]) -> ExecutorResult<Value> {
        match self {
            Side::Field(f) => Ok(f.decode(record)?),
            Side::Literal(v) => Ok(v.clone()),
        }
    }
}

/// A compiled `left op right` test over raw records
#[derive(Debug, Clone)]
pub struct ConditionFilter {
    left: Side,
    op: CompOp,
    right: Side,
}

impl ConditionFilter {
    /// Binds `condition` to `table`.
    ///
    /// Attribute operands must name fields of `table`; their relation
    /// qualifier is not re-checked here. A string literal compared with a
    /// date field is parsed as a date.
    pub fn new(table: &TableMeta, condition: &Condition) -> ExecutorResult<Self> {
        let mut left = bind(table, &condition.left)?;
        let mut right = bind(table, &condition.right)?;

        coerce_literal(&mut left, &right)?;
        coerce_literal(&mut right, &left)?;

        let (lt, rt) = (left.attr_type(), right.attr_type());
        if !lt.comparable_with(rt) {
            return Err(ExecutorError::type_mismatch(format!(
                "cannot compare {} with {} in table '{}'",
                lt,
                rt,
                table.name()
            )));
        }

        Ok(Self {
            left,
            op: condition.op,
            right,
        })
    }

    pub fn op(&self) -> CompOp {
        self.op
    }

    /// Whether the raw record satisfies the condition
    pub fn filter(&self, record: &[u8]) -> ExecutorResult<bool> {
        let left = self.left.value(record)?;
        let right = self.right.value(record)?;
        let ordering = left.compare(&right)?;
        Ok(self.op.matches(ordering))
    }

    /// For `field op literal` (either way round, op not `<>`), the field name,
    /// the operator with the field on the left, and the literal encoded in the
    /// field's layout
    pub fn index_probe(&self) -> Option<(&str, CompOp, Vec<u8>)> {
        if self.op == CompOp::Ne {
            return None;
        }
        let (field, op, literal) = match (&self.left, &self.right) {
            (Side::Field(f), Side::Literal(v)) => (f, self.op, v),
            (Side::Literal(v), Side::Field(f)) => (f, self.op.flip(), v),
            _ => return None,
        };
        let key = literal
            .coerce_to(field.attr_type)
            .and_then(|v| v.encode(field.len))
            .ok()?;
        Some((field.name.as_str(), op, key))
    }
}

fn bind(table: &TableMeta, operand: &Operand) -> ExecutorResult<Side> {
    match operand {
        Operand::Value(v) => Ok(Side::Literal(v.clone())),
        Operand::Attr(attr) => table
            .field(&attr.attribute)
            .cloned()
            .map(Side::Field)
            .ok_or_else(|| ExecutorError::field_missing(table.name(), &attr.attribute)),
    }
}

fn coerce_literal(side: &mut Side, other: &Side) -> ExecutorResult<()> {
    let coerced = match (&*side, other) {
        (Side::Literal(v @ Value::Chars(_)), Side::Field(f)) if f.attr_type == AttrType::Date => {
            v.coerce_to(AttrType::Date)?
        }
        _ => return Ok(()),
    };
    *side = Side::Literal(coerced);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::errors::ExecutorErrorCode;
    use crate::planner::AttrDef;

    fn meta() -> TableMeta {
        TableMeta::new(
            "t",
            &[
                AttrDef::new("id", AttrType::Int),
                AttrDef::chars("name", 4),
                AttrDef::new("score", AttrType::Float),
                AttrDef::new("born", AttrType::Date),
            ],
        )
        .unwrap()
    }

    fn record(id: i32, name: &str, score: f32, born: &str) -> Vec<u8> {
        meta()
            .encode_record(&[
                Value::Int(id),
                Value::from(name),
                Value::Float(score),
                Value::from(born),
            ])
            .unwrap()
    }

    fn cond(left: Operand, op: CompOp, right: Operand) -> Condition {
        Condition::new(left, op, right)
    }

    #[test]
    fn test_attr_vs_literal() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(Operand::attr(None, "id"), CompOp::Gt, Operand::value(1)),
        )
        .unwrap();
        assert!(f.filter(&record(2, "b", 0.0, "2020-01-01")).unwrap());
        assert!(!f.filter(&record(1, "a", 0.0, "2020-01-01")).unwrap());
    }

    #[test]
    fn test_literal_on_left() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(Operand::value(5), CompOp::Le, Operand::attr(Some("t"), "id")),
        )
        .unwrap();
        assert!(f.filter(&record(5, "a", 0.0, "2020-01-01")).unwrap());
        assert!(!f.filter(&record(4, "a", 0.0, "2020-01-01")).unwrap());

        let (field, op, key) = f.index_probe().unwrap();
        assert_eq!(field, "id");
        assert_eq!(op, CompOp::Ge);
        assert_eq!(key, 5i32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_int_literal_against_float_field() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(Operand::attr(None, "score"), CompOp::Ge, Operand::value(2)),
        )
        .unwrap();
        assert!(f.filter(&record(1, "a", 2.5, "2020-01-01")).unwrap());
        assert!(!f.filter(&record(1, "a", 1.5, "2020-01-01")).unwrap());
    }

    #[test]
    fn test_date_literal_coerced() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(
                Operand::attr(None, "born"),
                CompOp::Lt,
                Operand::value("2000-06-01"),
            ),
        )
        .unwrap();
        assert!(f.filter(&record(1, "a", 0.0, "1999-12-31")).unwrap());
        assert!(!f.filter(&record(1, "a", 0.0, "2000-06-01")).unwrap());
    }

    #[test]
    fn test_invalid_date_literal_rejected() {
        let err = ConditionFilter::new(
            &meta(),
            &cond(
                Operand::attr(None, "born"),
                CompOp::Eq,
                Operand::value("2000-02-30"),
            ),
        )
        .unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::TypeMismatch);
    }

    #[test]
    fn test_attr_vs_attr_same_table() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(Operand::attr(None, "id"), CompOp::Ne, Operand::attr(None, "score")),
        )
        .unwrap();
        assert!(f.filter(&record(1, "a", 1.5, "2020-01-01")).unwrap());
        assert!(!f.filter(&record(2, "a", 2.0, "2020-01-01")).unwrap());
        assert!(f.index_probe().is_none());
    }

    #[test]
    fn test_missing_field() {
        let err = ConditionFilter::new(
            &meta(),
            &cond(Operand::attr(None, "nope"), CompOp::Eq, Operand::value(1)),
        )
        .unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::SchemaFieldMissing);
    }

    #[test]
    fn test_incompatible_types_fail_at_bind() {
        let err = ConditionFilter::new(
            &meta(),
            &cond(Operand::attr(None, "name"), CompOp::Eq, Operand::value(1)),
        )
        .unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::TypeMismatch);
    }

    #[test]
    fn test_ne_has_no_index_probe() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(Operand::attr(None, "id"), CompOp::Ne, Operand::value(1)),
        )
        .unwrap();
        assert!(f.index_probe().is_none());
    }

    #[test]
    fn test_two_literals() {
        let f = ConditionFilter::new(
            &meta(),
            &cond(Operand::value(1), CompOp::Lt, Operand::value(2)),
        )
        .unwrap();
        assert!(f.filter(&record(0, "", 0.0, "2020-01-01")).unwrap());
    }
}
