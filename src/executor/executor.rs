//! Statement dispatcher
//!
//! Runs one statement against the catalog and answers with the text the
//! client sees: a rendered result set for SELECT, `SUCCESS` or `FAILURE`
//! otherwise. Failure detail goes to the log only.
//!
//! Outside an explicit transaction every data statement is committed when it
//! succeeds and rolled back when it fails.

use crate::observability::{Event, Logger, MetricsRegistry};
use crate::planner::{CreateIndex, CreateTable, Deletes, Inserts, Operand, Selects, Statement};
use crate::session::Session;
use crate::storage::Handler;

use super::aggregate::aggregate;
use super::errors::{ExecutorError, ExecutorErrorCode, ExecutorResult};
use super::filters::ConditionFilter;
use super::join::CrossJoin;
use super::selection::create_selection_executor;

pub const SUCCESS: &str = "SUCCESS\n";
pub const FAILURE: &str = "FAILURE\n";
pub const UNSUPPORTED: &str = "Unsupported\n";

const HELP_TEXT: &str = "show tables;
desc `table name`;
create table `table name` (`column name` `column type`, ...);
create index `index name` on `table` (`column`);
insert into `table` values(`value1`,`value2`);
delete from `table` [where `column`=`value`];
select [ * | `columns` ] from `table`;
";

/// Statement engine over one catalog
pub struct Engine {
    handler: Handler,
    metrics: MetricsRegistry,
    sync_on_commit: bool,
}

impl Engine {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            metrics: MetricsRegistry::new(),
            sync_on_commit: false,
        }
    }

    /// Flush the session database's indexes after every commit
    pub fn with_sync_on_commit(mut self, sync_on_commit: bool) -> Self {
        self.sync_on_commit = sync_on_commit;
        self
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut Handler {
        &mut self.handler
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Executes `statement` in `session` and returns the response text
    pub fn execute(&mut self, session: &mut Session, statement: &Statement) -> String {
        self.metrics.increment_statements_executed();
        let trx_id = session.trx().id().to_string();
        Logger::trace(
            Event::StatementBegin,
            &[
                ("db", session.current_db()),
                ("statement", statement.name()),
                ("trx_id", trx_id.as_str()),
            ],
        );

        let result = match statement {
            Statement::Select(selects) => self.do_select(session, selects),
            Statement::Insert(inserts) => self.do_insert(session, inserts),
            Statement::Delete(deletes) => self.do_delete(session, deletes),
            Statement::CreateTable(create) => self.do_create_table(session, create),
            Statement::CreateIndex(create) => self.do_create_index(session, create),
            Statement::ShowTables => self.do_show_tables(session),
            Statement::DescTable { table } => self.do_desc_table(session, table),
            Statement::Sync => self
                .handler
                .sync()
                .map(|_| SUCCESS.to_string())
                .map_err(ExecutorError::from),
            Statement::Begin => {
                session.set_trx_multi_operation_mode(true);
                Ok(SUCCESS.to_string())
            }
            Statement::Commit => self.do_commit(session),
            Statement::Rollback => self.do_rollback(session),
            Statement::Help => Ok(HELP_TEXT.to_string()),
            Statement::Exit => Ok(UNSUPPORTED.to_string()),
        };

        let transactional = matches!(
            statement,
            Statement::Select(_)
                | Statement::Insert(_)
                | Statement::Delete(_)
                | Statement::CreateTable(_)
                | Statement::CreateIndex(_)
        );
        let mut failed = result.is_err();
        if transactional {
            if let Err(e) = self.end_trx_if_need(session, !failed) {
                self.report_failure(statement, &trx_id, &e);
                failed = true;
            }
        }

        match result {
            Ok(response) if !failed => response,
            Ok(_) => FAILURE.to_string(),
            Err(e) => {
                self.report_failure(statement, &trx_id, &e);
                FAILURE.to_string()
            }
        }
    }

    /// Commits on success and rolls back on failure unless the session is
    /// inside an explicit transaction
    fn end_trx_if_need(&mut self, session: &mut Session, success: bool) -> ExecutorResult<()> {
        if session.is_trx_multi_operation_mode() {
            return Ok(());
        }
        if success {
            self.commit(session)
        } else {
            self.metrics.increment_rollbacks();
            session.current_trx().rollback(&mut self.handler)?;
            Ok(())
        }
    }

    fn commit(&mut self, session: &mut Session) -> ExecutorResult<()> {
        session.current_trx().commit()?;
        self.metrics.increment_commits();
        if self.sync_on_commit && self.handler.has_database(session.current_db()) {
            self.handler.sync_database(session.current_db())?;
        }
        Ok(())
    }

    fn do_commit(&mut self, session: &mut Session) -> ExecutorResult<String> {
        session.set_trx_multi_operation_mode(false);
        self.commit(session)?;
        Ok(SUCCESS.to_string())
    }

    fn do_rollback(&mut self, session: &mut Session) -> ExecutorResult<String> {
        session.set_trx_multi_operation_mode(false);
        self.metrics.increment_rollbacks();
        session.current_trx().rollback(&mut self.handler)?;
        Ok(SUCCESS.to_string())
    }

    fn report_failure(&self, statement: &Statement, trx_id: &str, err: &ExecutorError) {
        self.metrics.increment_statements_failed();
        if err.code() == ExecutorErrorCode::UniqueConstraintConflict {
            self.metrics.increment_unique_conflicts();
        }
        let fields = [
            ("code", err.code().code()),
            ("message", err.message()),
            ("statement", statement.name()),
            ("trx_id", trx_id),
        ];
        if err.is_internal() {
            Logger::error(Event::StatementFailed, &fields);
        } else {
            Logger::warn(Event::StatementFailed, &fields);
        }
    }

    fn do_select(&self, session: &Session, selects: &Selects) -> ExecutorResult<String> {
        let db = session.current_db();
        validate_select(selects)?;

        let mut nodes = Vec::with_capacity(selects.relations.len());
        for relation in &selects.relations {
            let table = self
                .handler
                .find_table(db, relation)
                .ok_or_else(|| ExecutorError::table_not_found(relation))?;
            nodes.push(create_selection_executor(session.trx(), selects, table)?);
        }

        let mut sets = Vec::with_capacity(nodes.len());
        for node in &nodes {
            sets.push(node.execute(&self.metrics)?);
        }

        let (rows, response) = if sets.len() == 1 {
            let set = &sets[0];
            if selects.is_aggregate() {
                let out = aggregate(selects, set, &selects.relations[0])?;
                (out.len(), out.render(false))
            } else {
                (set.len(), set.render(false))
            }
        } else {
            let joined = CrossJoin::new(sets, selects)?.execute()?;
            (joined.len(), joined.render(true))
        };

        self.metrics.add_rows_returned(rows as u64);
        let rows = rows.to_string();
        let relations = selects.relations.join(",");
        Logger::trace(
            Event::SelectComplete,
            &[("relations", relations.as_str()), ("rows", rows.as_str())],
        );
        Ok(response)
    }

    fn do_insert(&mut self, session: &mut Session, inserts: &Inserts) -> ExecutorResult<String> {
        let db = session.current_db().to_string();
        let rid = self
            .handler
            .insert_record(&db, &inserts.table, &inserts.values)?;
        session.current_trx().record_insert(&db, &inserts.table, rid);
        Ok(SUCCESS.to_string())
    }

    fn do_delete(&mut self, session: &mut Session, deletes: &Deletes) -> ExecutorResult<String> {
        let db = session.current_db().to_string();
        let table = self
            .handler
            .find_table(&db, &deletes.table)
            .ok_or_else(|| ExecutorError::table_not_found(&deletes.table))?;

        for condition in &deletes.conditions {
            for side in [&condition.left, &condition.right] {
                if let Operand::Attr(attr) = side {
                    match attr.relation.as_deref() {
                        Some(r) if r != deletes.table => {
                            return Err(ExecutorError::table_not_found(r))
                        }
                        _ => {}
                    }
                }
            }
        }
        let filters = deletes
            .conditions
            .iter()
            .map(|c| ConditionFilter::new(table.meta(), c))
            .collect::<ExecutorResult<Vec<_>>>()?;

        self.metrics.increment_full_scans();
        let mut doomed = Vec::new();
        'records: for (rid, record) in table.scan() {
            for filter in &filters {
                if !filter.filter(record)? {
                    continue 'records;
                }
            }
            doomed.push(rid);
        }

        for rid in doomed {
            let image = self.handler.delete_record(&db, &deletes.table, rid)?;
            session
                .current_trx()
                .record_delete(&db, &deletes.table, rid, image);
        }
        Ok(SUCCESS.to_string())
    }

    fn do_create_table(&mut self, session: &Session, create: &CreateTable) -> ExecutorResult<String> {
        self.handler
            .create_table(session.current_db(), &create.name, &create.attributes)?;
        Ok(SUCCESS.to_string())
    }

    fn do_create_index(&mut self, session: &Session, create: &CreateIndex) -> ExecutorResult<String> {
        self.handler.create_index(
            session.current_db(),
            &create.table,
            &create.name,
            &create.fields,
            create.unique,
        )?;
        Ok(SUCCESS.to_string())
    }

    fn do_show_tables(&self, session: &Session) -> ExecutorResult<String> {
        let names = self.handler.table_names(session.current_db())?;
        if names.is_empty() {
            return Ok("No table\n".to_string());
        }
        let mut out = String::new();
        for name in names {
            out.push_str(name);
            out.push('\n');
        }
        Ok(out)
    }

    fn do_desc_table(&self, session: &Session, table: &str) -> ExecutorResult<String> {
        self.handler
            .find_table(session.current_db(), table)
            .map(|t| t.meta().describe())
            .ok_or_else(|| ExecutorError::table_not_found(table))
    }
}

/// Checks that every relation a SELECT mentions is in its FROM list
fn validate_select(selects: &Selects) -> ExecutorResult<()> {
    if selects.relations.is_empty() {
        return Err(ExecutorError::syntax("select without relations"));
    }
    let multi = selects.relations.len() > 1;
    let known = |r: &str| selects.relations.iter().any(|rel| rel == r);

    for attr in &selects.attributes {
        if let Some(r) = attr.relation.as_deref() {
            if !known(r) {
                return Err(ExecutorError::table_not_found(r));
            }
        }
    }
    for condition in &selects.conditions {
        for side in [&condition.left, &condition.right] {
            let Some(attr) = side.as_attr() else { continue };
            match attr.relation.as_deref() {
                Some(r) if !known(r) => return Err(ExecutorError::table_not_found(r)),
                None if multi => {
                    return Err(ExecutorError::syntax(format!(
                        "attribute '{}' needs a relation in a multi-table select",
                        attr.attribute
                    )))
                }
                _ => {}
            }
        }
    }
    if multi && selects.is_aggregate() {
        return Err(ExecutorError::rejected(
            "aggregates over several relations are not supported",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{AggreType, AttrDef, CompOp, Condition, RelAttr};
    use crate::types::{AttrType, Value};
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> (Engine, Session) {
        let mut handler = Handler::open(dir.path()).unwrap();
        handler.ensure_database("sys").unwrap();
        (Engine::new(handler), Session::new("sys"))
    }

    fn create_t(engine: &mut Engine, session: &mut Session) {
        let create = Statement::CreateTable(CreateTable {
            name: "t".to_string(),
            attributes: vec![AttrDef::new("id", AttrType::Int), AttrDef::chars("name", 4)],
        });
        assert_eq!(engine.execute(session, &create), SUCCESS);
    }

    fn insert(id: i32, name: &str) -> Statement {
        Statement::Insert(Inserts {
            table: "t".to_string(),
            values: vec![Value::Int(id), Value::from(name)],
        })
    }

    fn select_all() -> Statement {
        Statement::Select(Selects::new().from("t").attr(RelAttr::new("*")))
    }

    #[test]
    fn test_insert_then_select() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        create_t(&mut engine, &mut session);
        assert_eq!(engine.execute(&mut session, &insert(1, "a")), SUCCESS);
        assert_eq!(engine.execute(&mut session, &insert(2, "b")), SUCCESS);

        let out = engine.execute(&mut session, &select_all());
        assert_eq!(out, "id | name\n1 | a\n2 | b\n");
    }

    #[test]
    fn test_count_and_filter() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        create_t(&mut engine, &mut session);
        engine.execute(&mut session, &insert(1, "a"));
        engine.execute(&mut session, &insert(2, "b"));

        let count = Statement::Select(
            Selects::new()
                .from("t")
                .attr(RelAttr::aggregate(AggreType::Count, "*")),
        );
        assert_eq!(engine.execute(&mut session, &count), "COUNT(*)\n2\n");

        let filtered = Statement::Select(
            Selects::new()
                .from("t")
                .attr(RelAttr::new("id"))
                .condition(Condition::new(
                    Operand::attr(None, "id"),
                    CompOp::Gt,
                    Operand::value(1),
                )),
        );
        assert_eq!(engine.execute(&mut session, &filtered), "id\n2\n");
    }

    #[test]
    fn test_failed_statement_answers_failure() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        let select = Statement::Select(Selects::new().from("missing").attr(RelAttr::new("*")));
        assert_eq!(engine.execute(&mut session, &select), FAILURE);
        assert_eq!(engine.metrics().snapshot().statements_failed, 1);
    }

    #[test]
    fn test_select_without_relations_is_failure() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        let select = Statement::Select(Selects::new().attr(RelAttr::new("*")));
        assert_eq!(engine.execute(&mut session, &select), FAILURE);
    }

    #[test]
    fn test_explicit_rollback() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        create_t(&mut engine, &mut session);
        engine.execute(&mut session, &insert(1, "a"));

        assert_eq!(engine.execute(&mut session, &Statement::Begin), SUCCESS);
        engine.execute(&mut session, &insert(2, "b"));
        let delete = Statement::Delete(Deletes {
            table: "t".to_string(),
            conditions: vec![],
        });
        assert_eq!(engine.execute(&mut session, &delete), SUCCESS);
        assert_eq!(engine.execute(&mut session, &select_all()), "id | name\n");

        assert_eq!(engine.execute(&mut session, &Statement::Rollback), SUCCESS);
        assert!(!session.is_trx_multi_operation_mode());
        assert_eq!(engine.execute(&mut session, &select_all()), "id | name\n1 | a\n");
    }

    #[test]
    fn test_show_and_desc() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        assert_eq!(engine.execute(&mut session, &Statement::ShowTables), "No table\n");
        create_t(&mut engine, &mut session);
        assert_eq!(engine.execute(&mut session, &Statement::ShowTables), "t\n");

        let desc = engine.execute(
            &mut session,
            &Statement::DescTable {
                table: "t".to_string(),
            },
        );
        assert!(desc.starts_with("t(\n"));
        assert_eq!(
            engine.execute(
                &mut session,
                &Statement::DescTable {
                    table: "u".to_string()
                }
            ),
            FAILURE
        );
    }

    #[test]
    fn test_help_and_exit() {
        let dir = TempDir::new().unwrap();
        let (mut engine, mut session) = engine(&dir);
        assert!(engine
            .execute(&mut session, &Statement::Help)
            .contains("show tables;"));
        assert_eq!(engine.execute(&mut session, &Statement::Exit), UNSUPPORTED);
    }

    #[test]
    fn test_unqualified_condition_in_join_rejected() {
        let selects = Selects::new()
            .from("a")
            .from("b")
            .attr(RelAttr::new("*"))
            .condition(Condition::new(
                Operand::attr(None, "id"),
                CompOp::Eq,
                Operand::value(1),
            ));
        let err = validate_select(&selects).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::SyntaxError);
    }
}
