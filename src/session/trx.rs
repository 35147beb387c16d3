//! Undo-log transactions
//!
//! A `Trx` records every insert and delete made through it. Commit discards
//! the log; rollback replays it newest first against the handler. The same
//! handle is reused for the next transaction with a fresh id.

use std::collections::HashMap;

use thiserror::Error;

use crate::observability::{Event, Logger};
use crate::storage::{Handler, Rid};

#[derive(Debug, Error)]
pub enum TrxError {
    #[error("rollback of transaction {trx_id} left {failed} change(s) in place; first failure: {first}")]
    UndoFailed {
        trx_id: u64,
        failed: usize,
        first: String,
    },
}

/// One reversible change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOp {
    Inserted {
        db: String,
        table: String,
        rid: Rid,
    },
    Deleted {
        db: String,
        table: String,
        rid: Rid,
        record: Vec<u8>,
    },
}

#[derive(Debug)]
pub struct Trx {
    id: u64,
    undo: Vec<UndoOp>,
}

impl Default for Trx {
    fn default() -> Self {
        Self::new()
    }
}

impl Trx {
    pub fn new() -> Self {
        Self {
            id: 1,
            undo: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of changes that a rollback would undo
    pub fn pending(&self) -> usize {
        self.undo.len()
    }

    pub fn record_insert(&mut self, db: &str, table: &str, rid: Rid) {
        self.undo.push(UndoOp::Inserted {
            db: db.to_string(),
            table: table.to_string(),
            rid,
        });
    }

    pub fn record_delete(&mut self, db: &str, table: &str, rid: Rid, record: Vec<u8>) {
        self.undo.push(UndoOp::Deleted {
            db: db.to_string(),
            table: table.to_string(),
            rid,
            record,
        });
    }

    /// Makes every recorded change permanent
    pub fn commit(&mut self) -> Result<(), TrxError> {
        let trx_id = self.id.to_string();
        let changes = self.undo.len().to_string();
        Logger::trace(
            Event::TrxCommit,
            &[("changes", changes.as_str()), ("trx_id", trx_id.as_str())],
        );
        self.finish();
        Ok(())
    }

    /// Reverts every recorded change, newest first.
    ///
    /// A change that cannot be reverted is logged and skipped; the remaining
    /// changes are still reverted.
    pub fn rollback(&mut self, handler: &mut Handler) -> Result<(), TrxError> {
        // Deleted records come back under new rids; later undo steps follow the move
        let mut moved: HashMap<(String, String, Rid), Rid> = HashMap::new();
        let mut failed = 0;
        let mut first = None;

        while let Some(op) = self.undo.pop() {
            let result = match op {
                UndoOp::Inserted { db, table, rid } => {
                    let rid = moved.remove(&(db.clone(), table.clone(), rid)).unwrap_or(rid);
                    handler.delete_record(&db, &table, rid).map(|_| ())
                }
                UndoOp::Deleted {
                    db,
                    table,
                    rid,
                    record,
                } => handler.insert_raw(&db, &table, record).map(|new_rid| {
                    if new_rid != rid {
                        moved.insert((db, table, rid), new_rid);
                    }
                }),
            };
            if let Err(e) = result {
                let reason = e.to_string();
                let trx_id = self.id.to_string();
                Logger::error(
                    Event::TrxUndoFailed,
                    &[("reason", reason.as_str()), ("trx_id", trx_id.as_str())],
                );
                failed += 1;
                first.get_or_insert(reason);
            }
        }

        let trx_id = self.id;
        let trx_id_str = trx_id.to_string();
        Logger::info(Event::TrxRollback, &[("trx_id", trx_id_str.as_str())]);
        self.finish();

        match first {
            None => Ok(()),
            Some(first) => Err(TrxError::UndoFailed {
                trx_id,
                failed,
                first,
            }),
        }
    }

    fn finish(&mut self) {
        self.undo.clear();
        self.id += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::AttrDef;
    use crate::types::{AttrType, Value};
    use tempfile::TempDir;

    fn handler(dir: &TempDir) -> Handler {
        let mut h = Handler::open(dir.path()).unwrap();
        h.ensure_database("sys").unwrap();
        h.create_table("sys", "t", &[AttrDef::new("id", AttrType::Int)])
            .unwrap();
        h
    }

    fn count(h: &Handler) -> usize {
        h.find_table("sys", "t").unwrap().record_count()
    }

    #[test]
    fn test_commit_clears_log_and_advances_id() {
        let dir = TempDir::new().unwrap();
        let mut h = handler(&dir);
        let mut trx = Trx::new();
        let rid = h.insert_record("sys", "t", &[Value::Int(1)]).unwrap();
        trx.record_insert("sys", "t", rid);
        assert_eq!(trx.pending(), 1);

        trx.commit().unwrap();
        assert_eq!(trx.pending(), 0);
        assert_eq!(trx.id(), 2);
        assert_eq!(count(&h), 1);
    }

    #[test]
    fn test_rollback_reverts_inserts_and_deletes() {
        let dir = TempDir::new().unwrap();
        let mut h = handler(&dir);
        let kept = h.insert_record("sys", "t", &[Value::Int(1)]).unwrap();

        let mut trx = Trx::new();
        let rid = h.insert_record("sys", "t", &[Value::Int(2)]).unwrap();
        trx.record_insert("sys", "t", rid);
        let image = h.delete_record("sys", "t", kept).unwrap();
        trx.record_delete("sys", "t", kept, image);
        assert_eq!(count(&h), 1);

        trx.rollback(&mut h).unwrap();
        assert_eq!(count(&h), 1);
        let table = h.find_table("sys", "t").unwrap();
        let values: Vec<Value> = table
            .scan()
            .map(|(_, r)| table.meta().decode_record(r).unwrap()[0].clone())
            .collect();
        assert_eq!(values, vec![Value::Int(1)]);
    }

    #[test]
    fn test_rollback_of_insert_then_delete_of_same_row() {
        let dir = TempDir::new().unwrap();
        let mut h = handler(&dir);
        let mut trx = Trx::new();

        let rid = h.insert_record("sys", "t", &[Value::Int(7)]).unwrap();
        trx.record_insert("sys", "t", rid);
        let image = h.delete_record("sys", "t", rid).unwrap();
        trx.record_delete("sys", "t", rid, image);

        // The re-inserted image lands on a new rid; the insert undo must follow it
        trx.rollback(&mut h).unwrap();
        assert_eq!(count(&h), 0);
    }
}
