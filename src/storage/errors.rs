//! Storage error types
//!
//! Error codes:
//! - STORAGE_DATABASE_NOT_FOUND (ERROR)
//! - STORAGE_TABLE_NOT_FOUND (ERROR)
//! - STORAGE_TABLE_EXISTS (ERROR)
//! - STORAGE_FIELD_MISSING (ERROR)
//! - STORAGE_INVALID_SCHEMA (ERROR)
//! - STORAGE_INVALID_RECORD (ERROR)
//! - STORAGE_RECORD_NOT_FOUND (ERROR)
//! - STORAGE_INDEX_EXISTS (ERROR)
//! - STORAGE_IO_ERROR (ERROR)
//! - STORAGE_INDEX_FAILED (severity of the wrapped index error)

use std::fmt;
use std::io;

use crate::index::{IndexError, IndexErrorCode};
use crate::types::ValueError;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Statement fails, the catalog stays usable
    Error,
    /// Persistent state cannot be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    DatabaseNotFound,
    TableNotFound,
    TableExists,
    FieldMissing,
    InvalidSchema,
    InvalidRecord,
    RecordNotFound,
    IndexExists,
    Io,
    Index,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::DatabaseNotFound => "STORAGE_DATABASE_NOT_FOUND",
            StorageErrorCode::TableNotFound => "STORAGE_TABLE_NOT_FOUND",
            StorageErrorCode::TableExists => "STORAGE_TABLE_EXISTS",
            StorageErrorCode::FieldMissing => "STORAGE_FIELD_MISSING",
            StorageErrorCode::InvalidSchema => "STORAGE_INVALID_SCHEMA",
            StorageErrorCode::InvalidRecord => "STORAGE_INVALID_RECORD",
            StorageErrorCode::RecordNotFound => "STORAGE_RECORD_NOT_FOUND",
            StorageErrorCode::IndexExists => "STORAGE_INDEX_EXISTS",
            StorageErrorCode::Io => "STORAGE_IO_ERROR",
            StorageErrorCode::Index => "STORAGE_INDEX_FAILED",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug)]
enum Cause {
    Io(io::Error),
    Index(IndexError),
    Value(ValueError),
}

/// Storage error type with full context
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    cause: Option<Cause>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn database_not_found(db: &str) -> Self {
        Self::new(
            StorageErrorCode::DatabaseNotFound,
            format!("database '{}' does not exist", db),
        )
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::new(
            StorageErrorCode::TableNotFound,
            format!("table '{}' does not exist", table),
        )
    }

    pub fn table_exists(table: &str) -> Self {
        Self::new(
            StorageErrorCode::TableExists,
            format!("table '{}' already exists", table),
        )
    }

    pub fn field_missing(table: &str, field: &str) -> Self {
        Self::new(
            StorageErrorCode::FieldMissing,
            format!("table '{}' has no field '{}'", table, field),
        )
    }

    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::InvalidSchema, reason)
    }

    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::InvalidRecord, reason)
    }

    /// Record value failed to convert to its field's type
    pub fn invalid_value(field: &str, source: ValueError) -> Self {
        Self {
            code: StorageErrorCode::InvalidRecord,
            message: format!("bad value for field '{}'", field),
            cause: Some(Cause::Value(source)),
        }
    }

    pub fn record_not_found(rid: impl fmt::Display) -> Self {
        Self::new(
            StorageErrorCode::RecordNotFound,
            format!("no live record at {}", rid),
        )
    }

    pub fn index_exists(index: &str) -> Self {
        Self::new(
            StorageErrorCode::IndexExists,
            format!("index '{}' already exists", index),
        )
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::Io,
            message: message.into(),
            cause: Some(Cause::Io(source)),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped index error, if the failure came from an index
    pub fn index_error(&self) -> Option<&IndexError> {
        match &self.cause {
            Some(Cause::Index(e)) => Some(e),
            _ => None,
        }
    }

    /// Whether an index rejected the write because of a duplicate key
    pub fn is_unique_conflict(&self) -> bool {
        self.index_error()
            .is_some_and(|e| e.code() == IndexErrorCode::UniqueConflict)
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self.index_error() {
            Some(e) if e.is_fatal() => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<IndexError> for StorageError {
    fn from(err: IndexError) -> Self {
        Self {
            code: StorageErrorCode::Index,
            message: err.message().to_string(),
            cause: Some(Cause::Index(err)),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code.code(), self.message)?;
        match &self.cause {
            Some(Cause::Io(e)) => write!(f, " (caused by: {})", e),
            Some(Cause::Index(e)) => write!(f, " (caused by: {})", e.code()),
            Some(Cause::Value(e)) => write!(f, " (caused by: {})", e),
            None => Ok(()),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(Cause::Io(e)) => Some(e),
            Some(Cause::Index(e)) => Some(e),
            Some(Cause::Value(e)) => Some(e),
            None => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
