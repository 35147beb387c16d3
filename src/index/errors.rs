//! Index error types
//!
//! Error codes:
//! - INDEX_ALREADY_INITIALIZED (ERROR)
//! - INDEX_NOT_INITIALIZED (ERROR)
//! - INDEX_UNIQUE_CONFLICT (ERROR)
//! - INDEX_SCAN_OPEN_FAILED (ERROR)
//! - INDEX_INVALID_KEY (ERROR)
//! - INDEX_IO_FAILED (ERROR)
//! - INDEX_CORRUPTION (FATAL)

use std::fmt;
use std::io;

/// Severity levels for index errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The statement fails, the index stays usable
    Error,
    /// The index file cannot be trusted
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

/// Index-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// create/open called on a handle that is already attached
    AlreadyInitialized,
    /// Operation on a closed or never-opened handle
    NotInitialized,
    /// Unique index already holds a live entry for the key
    UniqueConflict,
    /// The ordered structure could not position a cursor
    ScanOpenFailed,
    /// Key bytes do not match the index key layout
    InvalidKey,
    /// Reading or writing the index file failed
    StructureIo,
    /// Index file failed validation
    Corruption,
}

impl IndexErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::AlreadyInitialized => "INDEX_ALREADY_INITIALIZED",
            IndexErrorCode::NotInitialized => "INDEX_NOT_INITIALIZED",
            IndexErrorCode::UniqueConflict => "INDEX_UNIQUE_CONFLICT",
            IndexErrorCode::ScanOpenFailed => "INDEX_SCAN_OPEN_FAILED",
            IndexErrorCode::InvalidKey => "INDEX_INVALID_KEY",
            IndexErrorCode::StructureIo => "INDEX_IO_FAILED",
            IndexErrorCode::Corruption => "INDEX_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            IndexErrorCode::Corruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Index error type with full context
#[derive(Debug)]
pub struct IndexError {
    code: IndexErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl IndexError {
    fn new(code: IndexErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn already_initialized(index_name: &str) -> Self {
        Self::new(
            IndexErrorCode::AlreadyInitialized,
            format!("index '{}' is already open", index_name),
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(IndexErrorCode::NotInitialized, "index is not open")
    }

    pub fn unique_conflict(index_name: &str) -> Self {
        Self::new(
            IndexErrorCode::UniqueConflict,
            format!("duplicate key for unique index '{}'", index_name),
        )
    }

    pub fn scan_open_failed(reason: impl Into<String>) -> Self {
        Self::new(IndexErrorCode::ScanOpenFailed, reason)
    }

    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::new(IndexErrorCode::InvalidKey, reason)
    }

    pub fn io(reason: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: IndexErrorCode::StructureIo,
            message: reason.into(),
            source: Some(source),
        }
    }

    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::new(IndexErrorCode::Corruption, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> IndexErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
