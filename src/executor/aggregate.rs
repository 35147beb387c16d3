//! Aggregation over a single relation's result set
//!
//! Produces exactly one row. Columns follow the reverse of the requested
//! attribute order, the same layout the selection schema uses.

use std::cmp::Ordering;

use crate::planner::{AggreType, RelAttr, Selects};
use crate::types::{round_to_cents, AttrType, Tuple, TupleSchema, TupleSet, Value};

use super::errors::{ExecutorError, ExecutorResult};

/// Collapses `input` into one row of COUNT/MIN/MAX/AVG values
pub fn aggregate(selects: &Selects, input: &TupleSet, table: &str) -> ExecutorResult<TupleSet> {
    if selects.attributes.iter().any(|a| !a.is_aggregate()) {
        return Err(ExecutorError::syntax(
            "aggregate and plain attributes cannot be mixed",
        ));
    }

    let mut schema = TupleSchema::new();
    let mut row = Tuple::with_capacity(selects.attributes.len());

    for attr in selects.attributes.iter().rev() {
        let (attr_type, value) = match attr.aggregate {
            AggreType::Count => {
                if !attr.counts_rows() {
                    column_of(input, table, attr)?;
                }
                (AttrType::Int, Value::Int(input.len() as i32))
            }
            AggreType::Min => extreme(input, table, attr, Ordering::Less)?,
            AggreType::Max => extreme(input, table, attr, Ordering::Greater)?,
            AggreType::Avg => average(input, table, attr)?,
            AggreType::None => {
                return Err(ExecutorError::syntax(format!(
                    "'{}' is not an aggregate",
                    attr.attribute
                )))
            }
        };
        schema.add(attr_type, table, &attr.display_name());
        row.add(value);
    }

    let mut result = TupleSet::new(schema);
    result.add(row);
    Ok(result)
}

fn column_of(input: &TupleSet, table: &str, attr: &RelAttr) -> ExecutorResult<usize> {
    input
        .schema()
        .index_of_field(table, &attr.attribute)
        .ok_or_else(|| ExecutorError::field_missing(table, &attr.attribute))
}

/// MIN (`want == Less`) or MAX (`want == Greater`); ties keep the earlier row
fn extreme(
    input: &TupleSet,
    table: &str,
    attr: &RelAttr,
    want: Ordering,
) -> ExecutorResult<(AttrType, Value)> {
    let col = column_of(input, table, attr)?;
    let attr_type = input
        .schema()
        .field(col)
        .map(|f| f.attr_type())
        .ok_or_else(|| ExecutorError::field_missing(table, &attr.attribute))?;

    let mut best: Option<&Value> = None;
    for tuple in input.tuples() {
        let Some(value) = tuple.get(col) else {
            return Err(ExecutorError::generic(format!(
                "row shorter than schema at column {}",
                col
            )));
        };
        best = match best {
            Some(current) if value.compare(current)? != want => Some(current),
            _ => Some(value),
        };
    }

    let best = best.ok_or_else(|| {
        ExecutorError::rejected(format!("{} over an empty set", attr.display_name()))
    })?;
    let value = match best {
        Value::Float(f) => Value::Float(round_to_cents(*f)),
        other => other.clone(),
    };
    Ok((attr_type, value))
}

fn average(input: &TupleSet, table: &str, attr: &RelAttr) -> ExecutorResult<(AttrType, Value)> {
    let col = column_of(input, table, attr)?;
    let numeric = input
        .schema()
        .field(col)
        .is_some_and(|f| f.attr_type().is_numeric());
    if !numeric {
        return Err(ExecutorError::type_mismatch(format!(
            "{} needs a numeric field",
            attr.display_name()
        )));
    }
    if input.is_empty() {
        return Err(ExecutorError::division_by_zero(format!(
            "{} over an empty set",
            attr.display_name()
        )));
    }

    let mut sum = 0.0f32;
    for tuple in input.tuples() {
        sum += match tuple.get(col) {
            Some(Value::Int(i)) => *i as f32,
            Some(Value::Float(f)) => *f,
            _ => {
                return Err(ExecutorError::type_mismatch(format!(
                    "non-numeric value in {}",
                    attr.display_name()
                )))
            }
        };
    }
    let avg = round_to_cents(sum / input.len() as f32);
    Ok((AttrType::Float, Value::Float(avg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::errors::ExecutorErrorCode;

    fn input(rows: &[(i32, &str, f32)]) -> TupleSet {
        let mut schema = TupleSchema::new();
        schema.add(AttrType::Int, "t", "id");
        schema.add(AttrType::Char, "t", "name");
        schema.add(AttrType::Float, "t", "score");
        let mut set = TupleSet::new(schema);
        for (id, name, score) in rows {
            set.add(Tuple::from(vec![
                Value::Int(*id),
                Value::from(*name),
                Value::Float(*score),
            ]));
        }
        set
    }

    fn select(attrs: &[(AggreType, &str)]) -> Selects {
        attrs
            .iter()
            .fold(Selects::new().from("t"), |s, (kind, a)| {
                s.attr(RelAttr::aggregate(*kind, *a))
            })
    }

    fn single(set: &TupleSet) -> Vec<Value> {
        assert_eq!(set.len(), 1);
        set.get(0).unwrap().values().to_vec()
    }

    #[test]
    fn test_count_star_and_literal() {
        let set = input(&[(1, "a", 1.0), (2, "b", 2.0)]);
        let out = aggregate(&select(&[(AggreType::Count, "*")]), &set, "t").unwrap();
        assert_eq!(single(&out), vec![Value::Int(2)]);

        let out = aggregate(&select(&[(AggreType::Count, "1")]), &set, "t").unwrap();
        assert_eq!(single(&out), vec![Value::Int(2)]);
    }

    #[test]
    fn test_count_of_empty_set_is_zero() {
        let out = aggregate(&select(&[(AggreType::Count, "*")]), &input(&[]), "t").unwrap();
        assert_eq!(single(&out), vec![Value::Int(0)]);
    }

    #[test]
    fn test_min_max() {
        let set = input(&[(3, "c", 1.234), (1, "a", 9.999), (2, "b", 5.0)]);
        let out = aggregate(
            &select(&[(AggreType::Min, "id"), (AggreType::Max, "score")]),
            &set,
            "t",
        )
        .unwrap();
        // Reverse of the requested order
        assert_eq!(single(&out), vec![Value::Float(10.0), Value::Int(1)]);
        let headers: Vec<&str> = out.schema().fields().iter().map(|f| f.field_name()).collect();
        assert_eq!(headers, vec!["MAX(score)", "MIN(id)"]);
    }

    #[test]
    fn test_min_is_permutation_invariant() {
        let a = input(&[(3, "c", 0.0), (1, "a", 0.0), (2, "b", 0.0)]);
        let b = input(&[(2, "b", 0.0), (3, "c", 0.0), (1, "a", 0.0)]);
        let q = select(&[(AggreType::Min, "id"), (AggreType::Avg, "id")]);
        assert_eq!(single(&aggregate(&q, &a, "t").unwrap()), single(&aggregate(&q, &b, "t").unwrap()));
    }

    #[test]
    fn test_avg_promotes_to_float_and_rounds() {
        let set = input(&[(1, "a", 0.0), (2, "b", 0.0), (2, "c", 0.0)]);
        let out = aggregate(&select(&[(AggreType::Avg, "id")]), &set, "t").unwrap();
        assert_eq!(single(&out), vec![Value::Float(1.67)]);
        assert_eq!(out.schema().field(0).unwrap().attr_type(), AttrType::Float);
    }

    #[test]
    fn test_half_cent_floats_round_up() {
        let set = input(&[(1, "a", 2.675)]);
        let q = select(&[
            (AggreType::Min, "score"),
            (AggreType::Max, "score"),
            (AggreType::Avg, "score"),
        ]);
        let out = aggregate(&q, &set, "t").unwrap();
        assert_eq!(
            single(&out),
            vec![Value::Float(2.68), Value::Float(2.68), Value::Float(2.68)]
        );
        assert_eq!(
            out.render(false),
            "AVG(score) | MAX(score) | MIN(score)\n2.68 | 2.68 | 2.68\n"
        );
    }

    #[test]
    fn test_avg_of_empty_set_is_division_by_zero() {
        let err = aggregate(&select(&[(AggreType::Avg, "id")]), &input(&[]), "t").unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::DivisionByZero);
    }

    #[test]
    fn test_avg_of_chars_is_type_mismatch() {
        let set = input(&[(1, "a", 0.0)]);
        let err = aggregate(&select(&[(AggreType::Avg, "name")]), &set, "t").unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::TypeMismatch);
    }

    #[test]
    fn test_min_of_empty_set_fails() {
        let err = aggregate(&select(&[(AggreType::Min, "id")]), &input(&[]), "t").unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::GenericError);
        assert!(!err.is_internal());
    }

    #[test]
    fn test_mixed_attributes_rejected() {
        let q = Selects::new()
            .from("t")
            .attr(RelAttr::aggregate(AggreType::Count, "*"))
            .attr(RelAttr::new("id"));
        let err = aggregate(&q, &input(&[]), "t").unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::SyntaxError);
    }
}
