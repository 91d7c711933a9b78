//! Backend error types.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors a backend may return from an operation.
///
/// All of these are per-operation outcomes: the session reports them to the
/// client and keeps serving.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The key (or, for a scan, every key in range) does not exist.
    #[error("record not found")]
    NotFound,

    /// The write conflicts with existing data or concurrent activity.
    ///
    /// Backends retry transient contention themselves before returning this.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The table is not part of the installed schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The column is not part of the table.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    /// A table with this name already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// Any other storage failure.
    #[error("backend failure: {0}")]
    Failed(String),
}

impl BackendError {
    /// Creates a `Conflict` error.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// Returns true if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true if this is a `Conflict` error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
