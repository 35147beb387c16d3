//! Per-relation selection nodes
//!
//! A node scans one table, keeps the records that pass every bound filter and
//! projects them onto its schema. When one of the filters compares an indexed
//! field with a literal the candidate records come from an index scan instead
//! of the full heap.

use crate::observability::MetricsRegistry;
use crate::planner::{Operand, Selects};
use crate::session::Trx;
use crate::storage::{FieldMeta, Rid, Table};
use crate::types::{Tuple, TupleSchema, TupleSet};

use super::errors::{ExecutorError, ExecutorResult};
use super::filters::ConditionFilter;

pub struct SelectionNode<'a> {
    table: &'a Table,
    schema: TupleSchema,
    projection: Vec<FieldMeta>,
    filters: Vec<ConditionFilter>,
    trx_id: u64,
}

impl<'a> SelectionNode<'a> {
    /// Binds the node to `table`; every schema field must be a field of it
    pub fn init(
        trx: &Trx,
        table: &'a Table,
        schema: TupleSchema,
        filters: Vec<ConditionFilter>,
    ) -> ExecutorResult<Self> {
        let projection = schema
            .fields()
            .iter()
            .map(|f| {
                table
                    .meta()
                    .field(f.field_name())
                    .cloned()
                    .ok_or_else(|| ExecutorError::field_missing(table.name(), f.field_name()))
            })
            .collect::<ExecutorResult<Vec<_>>>()?;

        Ok(Self {
            table,
            schema,
            projection,
            filters,
            trx_id: trx.id(),
        })
    }

    pub fn schema(&self) -> &TupleSchema {
        &self.schema
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    pub fn trx_id(&self) -> u64 {
        self.trx_id
    }

    /// Runs the scan and returns the matching rows
    pub fn execute(&self, metrics: &MetricsRegistry) -> ExecutorResult<TupleSet> {
        let mut result = TupleSet::new(self.schema.clone());

        match self.index_candidates()? {
            Some(rids) => {
                metrics.increment_index_scans();
                for rid in rids {
                    if let Some(record) = self.table.record(rid) {
                        self.emit(record, &mut result)?;
                    }
                }
            }
            None => {
                metrics.increment_full_scans();
                for (_, record) in self.table.scan() {
                    self.emit(record, &mut result)?;
                }
            }
        }

        Ok(result)
    }

    /// Rids from the first filter that can be answered by a single-field index
    fn index_candidates(&self) -> ExecutorResult<Option<Vec<Rid>>> {
        for filter in &self.filters {
            let Some((field, op, key)) = filter.index_probe() else {
                continue;
            };
            let Some(index) = self.table.find_index_on(field) else {
                continue;
            };
            let mut scanner = index.create_scanner(op, &key)?;
            let rids = scanner.by_ref().collect::<Result<Vec<_>, _>>()?;
            scanner.destroy();
            return Ok(Some(rids));
        }
        Ok(None)
    }

    fn emit(&self, record: &[u8], result: &mut TupleSet) -> ExecutorResult<()> {
        for filter in &self.filters {
            if !filter.filter(record)? {
                return Ok(());
            }
        }
        let mut tuple = Tuple::with_capacity(self.projection.len());
        for field in &self.projection {
            tuple.add(field.decode(record)?);
        }
        result.add(tuple);
        Ok(())
    }
}

/// Whether an attribute qualified by `relation` belongs to `table`.
///
/// An unqualified attribute belongs to the table only when it is the sole
/// relation of the statement.
fn match_table(selects: &Selects, relation: Option<&str>, table: &str) -> bool {
    match relation {
        Some(r) => r == table,
        None => selects.relations.len() == 1,
    }
}

/// Builds the selection node for `table` out of a SELECT statement.
///
/// Attributes are walked from last to first. A plain `*`, `COUNT(*)` or
/// `COUNT(<number>)` pulls in every field of the table and ends the walk.
pub fn create_selection_executor<'a>(
    trx: &Trx,
    selects: &Selects,
    table: &'a Table,
) -> ExecutorResult<SelectionNode<'a>> {
    let meta = table.meta();
    let name = table.name();
    let multi = selects.relations.len() > 1;
    let mut schema = TupleSchema::new();

    for attr in selects.attributes.iter().rev() {
        if !attr.applies_to(name) {
            continue;
        }
        if (attr.is_wildcard() && !attr.is_aggregate()) || attr.counts_rows() {
            meta.append_to_schema(&mut schema);
            break;
        }
        if attr.is_aggregate() && (attr.is_wildcard() || attr.is_literal()) {
            return Err(ExecutorError::syntax(format!(
                "{} takes a field argument",
                attr.display_name()
            )));
        }
        match meta.field(&attr.attribute) {
            Some(field) => schema.add_if_not_exists(field.attr_type, name, &field.name),
            // Another relation of the join may carry it
            None if multi && attr.relation.is_none() => {}
            None => return Err(ExecutorError::field_missing(name, &attr.attribute)),
        }
    }

    if multi {
        for condition in selects.conditions.iter().filter(|c| c.is_cross_relation()) {
            for side in [&condition.left, &condition.right] {
                let Some(attr) = side.as_attr() else { continue };
                if attr.relation.as_deref() != Some(name) {
                    continue;
                }
                let field = meta
                    .field(&attr.attribute)
                    .ok_or_else(|| ExecutorError::field_missing(name, &attr.attribute))?;
                schema.add_if_not_exists(field.attr_type, name, &field.name);
            }
        }
    }

    let mut filters = Vec::new();
    for condition in &selects.conditions {
        let attach = match (&condition.left, &condition.right) {
            (Operand::Value(_), Operand::Value(_)) => true,
            (Operand::Attr(a), Operand::Value(_)) | (Operand::Value(_), Operand::Attr(a)) => {
                match_table(selects, a.relation.as_deref(), name)
            }
            (Operand::Attr(l), Operand::Attr(r)) => {
                match_table(selects, l.relation.as_deref(), name)
                    && match_table(selects, r.relation.as_deref(), name)
            }
        };
        if attach {
            filters.push(ConditionFilter::new(meta, condition)?);
        }
    }

    SelectionNode::init(trx, table, schema, filters)
}
