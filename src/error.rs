use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the workbook store and record operations.
///
/// "No matching record" on update/delete is the common case and is reported
/// as `Ok(false)` by those operations, not as an error. The variants here
/// cover the conditions a caller may need to branch on: a missing or
/// unreadable backing file (recoverable by reinitializing, at the caller's
/// discretion), unknown sheets, malformed externally edited files, and
/// plain I/O failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file is missing or could not be opened as a workbook.
    #[error("workbook unavailable at {}: {reason}", .path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    /// The sheet has no Booking ID column, so keyed operations cannot run.
    #[error("sheet '{0}' has no Booking ID column")]
    MissingKeyColumn(String),

    #[error("no record with id '{id}' in sheet '{sheet}'")]
    NotFound { sheet: String, id: String },

    /// A caller-supplied Booking ID collides with an existing record.
    #[error("booking id '{id}' already exists in sheet '{sheet}'")]
    DuplicateId { sheet: String, id: String },

    /// The table shape cannot be reconciled, e.g. duplicate column names
    /// or rows wider than the header in an externally edited file.
    #[error("malformed sheet data: {0}")]
    ShapeMismatch(String),

    #[error("failed to read workbook: {0}")]
    Read(String),

    #[error("failed to write workbook: {0}")]
    Write(String),

    #[error("failed to watch workbook: {0}")]
    Watch(String),

    #[error("store lock poisoned")]
    Lock,
}

pub type Result<T> = std::result::Result<T, StoreError>;
