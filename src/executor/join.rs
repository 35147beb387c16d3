//! N-way nested-loop cross join
//!
//! Combines the result sets of several selection nodes. Rows are enumerated
//! depth first, one relation per level in FROM order; a join condition is
//! checked at the deepest level it references, so failing prefixes are
//! skipped without visiting their suffixes.

use crate::planner::{AttrRef, CompOp, Selects};
use crate::types::{Tuple, TupleSchema, TupleSet, Value};

use super::errors::{ExecutorError, ExecutorResult};

/// Column position: (input index, column index within that input)
type Slot = (usize, usize);

#[derive(Debug, Clone)]
struct JoinCondition {
    left: Slot,
    op: CompOp,
    right: Slot,
    /// Deepest input the condition reads
    level: usize,
}

#[derive(Debug)]
pub struct CrossJoin {
    inputs: Vec<TupleSet>,
    relations: Vec<String>,
    output: TupleSchema,
    projection: Vec<Slot>,
    conditions: Vec<JoinCondition>,
}

impl CrossJoin {
    /// `inputs` holds one result set per relation of `selects`, in FROM order
    pub fn new(inputs: Vec<TupleSet>, selects: &Selects) -> ExecutorResult<Self> {
        if inputs.len() != selects.relations.len() {
            return Err(ExecutorError::generic(format!(
                "{} inputs for {} relations",
                inputs.len(),
                selects.relations.len()
            )));
        }

        let mut join = Self {
            inputs,
            relations: selects.relations.clone(),
            output: TupleSchema::new(),
            projection: Vec::new(),
            conditions: Vec::new(),
        };

        for attr in selects.attributes.iter().rev() {
            match (&attr.relation, attr.is_wildcard()) {
                (None, true) => {
                    for rel in (0..join.inputs.len()).rev() {
                        join.project_all(rel);
                    }
                    break;
                }
                (Some(relation), true) => {
                    let rel = join.relation_index(relation)?;
                    join.project_all(rel);
                }
                (Some(relation), false) => {
                    let rel = join.relation_index(relation)?;
                    let col = join.column(rel, &attr.attribute)?;
                    join.project((rel, col));
                }
                (None, false) => {
                    let slot = (0..join.inputs.len())
                        .find_map(|rel| {
                            let table = join.relations[rel].as_str();
                            join.inputs[rel]
                                .schema()
                                .index_of_field(table, &attr.attribute)
                                .map(|col| (rel, col))
                        })
                        .ok_or_else(|| {
                            ExecutorError::field_missing(&join.relations.join(","), &attr.attribute)
                        })?;
                    join.project(slot);
                }
            }
        }

        for condition in selects.conditions.iter().filter(|c| c.is_cross_relation()) {
            let (Some(l), Some(r)) = (condition.left.as_attr(), condition.right.as_attr()) else {
                continue;
            };
            let left = join.bind(l)?;
            let right = join.bind(r)?;
            join.conditions.push(JoinCondition {
                left,
                op: condition.op,
                right,
                level: left.0.max(right.0),
            });
        }

        Ok(join)
    }

    pub fn schema(&self) -> &TupleSchema {
        &self.output
    }

    /// Lazily enumerates the joined rows
    pub fn rows(&self) -> JoinRows<'_> {
        JoinRows::new(self)
    }

    /// Materializes every joined row
    pub fn execute(&self) -> ExecutorResult<TupleSet> {
        let mut result = TupleSet::new(self.output.clone());
        for row in self.rows() {
            result.add(row?);
        }
        Ok(result)
    }

    fn relation_index(&self, relation: &str) -> ExecutorResult<usize> {
        self.relations
            .iter()
            .position(|r| r == relation)
            .ok_or_else(|| ExecutorError::table_not_found(relation))
    }

    fn column(&self, rel: usize, field: &str) -> ExecutorResult<usize> {
        let table = self.relations[rel].as_str();
        self.inputs[rel]
            .schema()
            .index_of_field(table, field)
            .ok_or_else(|| ExecutorError::field_missing(table, field))
    }

    fn bind(&self, attr: &AttrRef) -> ExecutorResult<Slot> {
        let relation = attr
            .relation
            .as_deref()
            .ok_or_else(|| ExecutorError::syntax("join condition needs qualified attributes"))?;
        let rel = self.relation_index(relation)?;
        Ok((rel, self.column(rel, &attr.attribute)?))
    }

    fn project(&mut self, (rel, col): Slot) {
        let Some(field) = self.inputs[rel].schema().field(col) else {
            return;
        };
        if self
            .output
            .index_of_field(field.table_name(), field.field_name())
            .is_none()
        {
            self.output
                .add(field.attr_type(), field.table_name(), field.field_name());
            self.projection.push((rel, col));
        }
    }

    fn project_all(&mut self, rel: usize) {
        for col in 0..self.inputs[rel].schema().len() {
            self.project((rel, col));
        }
    }

    fn value(&self, cursor: &[usize], (rel, col): Slot) -> ExecutorResult<&Value> {
        self.inputs[rel]
            .get(cursor[rel])
            .and_then(|t| t.get(col))
            .ok_or_else(|| ExecutorError::generic(format!("join slot {}:{} out of range", rel, col)))
    }
}

/// Depth-first iterator over the combinations of a [`CrossJoin`].
///
/// Single pass; not restartable.
pub struct JoinRows<'j> {
    join: &'j CrossJoin,
    cursor: Vec<usize>,
    level: usize,
    done: bool,
}

impl<'j> JoinRows<'j> {
    fn new(join: &'j CrossJoin) -> Self {
        let done = join.inputs.is_empty() || join.inputs.iter().any(TupleSet::is_empty);
        Self {
            join,
            cursor: vec![0; join.inputs.len()],
            level: 0,
            done,
        }
    }

    /// Whether the row fixed at `self.level` satisfies the conditions that end there
    fn accepts(&self) -> ExecutorResult<bool> {
        for c in self.join.conditions.iter().filter(|c| c.level == self.level) {
            let left = self.join.value(&self.cursor, c.left)?;
            let right = self.join.value(&self.cursor, c.right)?;
            if !c.op.matches(left.compare(right)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Moves to the next candidate, backtracking past exhausted levels
    fn advance(&mut self) {
        loop {
            self.cursor[self.level] += 1;
            if self.cursor[self.level] < self.join.inputs[self.level].len() {
                return;
            }
            if self.level == 0 {
                self.done = true;
                return;
            }
            self.level -= 1;
        }
    }

    fn project(&self) -> ExecutorResult<Tuple> {
        let mut tuple = Tuple::with_capacity(self.join.projection.len());
        for slot in &self.join.projection {
            tuple.add(self.join.value(&self.cursor, *slot)?.clone());
        }
        Ok(tuple)
    }
}

impl Iterator for JoinRows<'_> {
    type Item = ExecutorResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.accepts() {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(false) => self.advance(),
                Ok(true) if self.level + 1 < self.cursor.len() => {
                    self.level += 1;
                    self.cursor[self.level] = 0;
                }
                Ok(true) => {
                    let row = self.project();
                    self.advance();
                    if row.is_err() {
                        self.done = true;
                    }
                    return Some(row);
                }
            }
        }
        None
    }
}
