//! Executor error types
//!
//! Error codes:
//! - TABLE_NOT_FOUND
//! - SCHEMA_FIELD_MISSING
//! - UNIQUE_CONSTRAINT_CONFLICT
//! - TYPE_MISMATCH
//! - DIVISION_BY_ZERO
//! - SCAN_OPEN_FAILED
//! - ALREADY_INITIALIZED
//! - SQL_SYNTAX
//! - GENERIC_ERROR
//!
//! Every failure answers the client with `FAILURE`. `Reject` errors are caused
//! by the statement; `Internal` errors are unexpected and logged in full.

use std::fmt;

use crate::index::{IndexError, IndexErrorCode};
use crate::session::TrxError;
use crate::storage::{StorageError, StorageErrorCode};
use crate::types::ValueError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The statement itself is at fault
    Reject,
    /// Unexpected engine failure
    Internal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    TableNotFound,
    SchemaFieldMissing,
    UniqueConstraintConflict,
    TypeMismatch,
    DivisionByZero,
    ScanOpenFailed,
    AlreadyInitialized,
    SyntaxError,
    GenericError,
}

impl ExecutorErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::TableNotFound => "TABLE_NOT_FOUND",
            ExecutorErrorCode::SchemaFieldMissing => "SCHEMA_FIELD_MISSING",
            ExecutorErrorCode::UniqueConstraintConflict => "UNIQUE_CONSTRAINT_CONFLICT",
            ExecutorErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ExecutorErrorCode::DivisionByZero => "DIVISION_BY_ZERO",
            ExecutorErrorCode::ScanOpenFailed => "SCAN_OPEN_FAILED",
            ExecutorErrorCode::AlreadyInitialized => "ALREADY_INITIALIZED",
            ExecutorErrorCode::SyntaxError => "SQL_SYNTAX",
            ExecutorErrorCode::GenericError => "GENERIC_ERROR",
        }
    }

    /// Default severity for this code
    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::ScanOpenFailed
            | ExecutorErrorCode::AlreadyInitialized
            | ExecutorErrorCode::GenericError => Severity::Internal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error type with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    severity: Severity,
    message: String,
}

impl ExecutorError {
    pub fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
        }
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::new(
            ExecutorErrorCode::TableNotFound,
            format!("no such table: {}", table),
        )
    }

    pub fn field_missing(table: &str, field: &str) -> Self {
        Self::new(
            ExecutorErrorCode::SchemaFieldMissing,
            format!("no such field: {}.{}", table, field),
        )
    }

    pub fn type_mismatch(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::TypeMismatch, reason)
    }

    pub fn division_by_zero(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::DivisionByZero, reason)
    }

    pub fn syntax(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::SyntaxError, reason)
    }

    /// Unclassified failure caused by the statement
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::GenericError,
            severity: Severity::Reject,
            message: reason.into(),
        }
    }

    /// Unclassified internal failure
    pub fn generic(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::GenericError, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_internal(&self) -> bool {
        self.severity == Severity::Internal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code.code(), self.message)
    }
}

impl std::error::Error for ExecutorError {}

impl From<ValueError> for ExecutorError {
    fn from(err: ValueError) -> Self {
        Self::type_mismatch(err.to_string())
    }
}

impl From<IndexError> for ExecutorError {
    fn from(err: IndexError) -> Self {
        let mut mapped = Self::from_index_code(err.code());
        mapped.message = err.to_string();
        mapped
    }
}

impl From<TrxError> for ExecutorError {
    fn from(err: TrxError) -> Self {
        Self::generic(err.to_string())
    }
}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err.code() {
            StorageErrorCode::TableNotFound | StorageErrorCode::DatabaseNotFound => {
                Self::new(ExecutorErrorCode::TableNotFound, message)
            }
            StorageErrorCode::FieldMissing => {
                Self::new(ExecutorErrorCode::SchemaFieldMissing, message)
            }
            StorageErrorCode::InvalidRecord => Self::new(ExecutorErrorCode::TypeMismatch, message),
            StorageErrorCode::TableExists
            | StorageErrorCode::IndexExists
            | StorageErrorCode::InvalidSchema => Self::rejected(message),
            StorageErrorCode::Index => match err.index_error() {
                Some(index_err) => {
                    let mut mapped = Self::from_index_code(index_err.code());
                    mapped.message = message;
                    mapped
                }
                None => Self::generic(message),
            },
            StorageErrorCode::RecordNotFound | StorageErrorCode::Io => Self::generic(message),
        }
    }
}

impl ExecutorError {
    fn from_index_code(code: IndexErrorCode) -> Self {
        let code = match code {
            IndexErrorCode::UniqueConflict => ExecutorErrorCode::UniqueConstraintConflict,
            IndexErrorCode::ScanOpenFailed => ExecutorErrorCode::ScanOpenFailed,
            IndexErrorCode::AlreadyInitialized => ExecutorErrorCode::AlreadyInitialized,
            _ => ExecutorErrorCode::GenericError,
        };
        Self::new(code, String::new())
    }
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
