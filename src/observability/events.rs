//! Observable events
//!
//! Events are explicit and typed; every log line names one of these.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,

    // Catalog
    /// Table created
    TableCreated,
    /// Index created and populated
    IndexCreated,
    /// Index file opened
    IndexOpened,
    /// Index handle closed
    IndexClosed,
    /// Index flushed to disk
    IndexSynced,
    /// Index delete found no matching entry
    IndexEntryMissing,
    /// Removing a half-inserted entry after a failed insert failed
    IndexUnwindFailed,

    // Statements
    /// Statement received
    StatementBegin,
    /// SELECT finished and rendered
    SelectComplete,
    /// Statement failed; the client sees FAILURE
    StatementFailed,
    /// Insert rejected by a unique index
    UniqueConflict,
    /// Index scanner could not be opened
    ScanOpenFailed,
    /// Script finished; carries the metrics snapshot
    ScriptComplete,

    // Transactions
    /// Transaction committed
    TrxCommit,
    /// Transaction rolled back
    TrxRollback,
    /// Undo entry could not be applied during rollback
    TrxUndoFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::TableCreated => "TABLE_CREATED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexOpened => "INDEX_OPENED",
            Event::IndexClosed => "INDEX_CLOSED",
            Event::IndexSynced => "INDEX_SYNCED",
            Event::IndexEntryMissing => "INDEX_ENTRY_MISSING",
            Event::IndexUnwindFailed => "INDEX_UNWIND_FAILED",

            Event::StatementBegin => "STATEMENT_BEGIN",
            Event::SelectComplete => "SELECT_COMPLETE",
            Event::StatementFailed => "STATEMENT_FAILED",
            Event::UniqueConflict => "UNIQUE_CONFLICT",
            Event::ScanOpenFailed => "SCAN_OPEN_FAILED",
            Event::ScriptComplete => "SCRIPT_COMPLETE",

            Event::TrxCommit => "TRX_COMMIT",
            Event::TrxRollback => "TRX_ROLLBACK",
            Event::TrxUndoFailed => "TRX_UNDO_FAILED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake_case() {
        let events = [
            Event::ConfigLoaded,
            Event::TableCreated,
            Event::IndexCreated,
            Event::IndexOpened,
            Event::IndexClosed,
            Event::IndexSynced,
            Event::IndexEntryMissing,
            Event::IndexUnwindFailed,
            Event::StatementBegin,
            Event::SelectComplete,
            Event::StatementFailed,
            Event::UniqueConflict,
            Event::ScanOpenFailed,
            Event::ScriptComplete,
            Event::TrxCommit,
            Event::TrxRollback,
            Event::TrxUndoFailed,
        ];
        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::SelectComplete), "SELECT_COMPLETE");
    }
}
