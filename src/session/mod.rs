//! Client sessions and transactions

mod trx;

pub use trx::{Trx, TrxError, UndoOp};

/// Per-client state: current database and the transaction in progress
#[derive(Debug)]
pub struct Session {
    current_db: String,
    trx: Trx,
    multi_op_mode: bool,
}

impl Session {
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            current_db: db.into(),
            trx: Trx::new(),
            multi_op_mode: false,
        }
    }

    pub fn current_db(&self) -> &str {
        &self.current_db
    }

    pub fn current_trx(&mut self) -> &mut Trx {
        &mut self.trx
    }

    pub fn trx(&self) -> &Trx {
        &self.trx
    }

    /// In multi-operation mode statements are not committed individually
    pub fn is_trx_multi_operation_mode(&self) -> bool {
        self.multi_op_mode
    }

    pub fn set_trx_multi_operation_mode(&mut self, on: bool) {
        self.multi_op_mode = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_auto_commit() {
        let mut session = Session::new("sys");
        assert_eq!(session.current_db(), "sys");
        assert!(!session.is_trx_multi_operation_mode());
        assert_eq!(session.current_trx().pending(), 0);

        session.set_trx_multi_operation_mode(true);
        assert!(session.is_trx_multi_operation_mode());
    }
}
