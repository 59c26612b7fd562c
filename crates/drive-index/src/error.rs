use drive_shared::FileId;
use rusqlite::ErrorCode;
use thiserror::Error;

use crate::models::IndexKind;

/// Errors produced by the drive index.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite / SQLCipher error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file id already exists in the main index, a (file, member) pair
    /// already exists, or one call carried the same member twice.
    #[error("Duplicate key in {table} for file {file_id}")]
    DuplicateKey { table: &'static str, file_id: FileId },

    /// Update / touch on a file id with no main entry.
    #[error("Entry not found: {0}")]
    NotFound(FileId),

    /// Any other storage-level constraint failure.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Malformed query arguments.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A serialized batch cursor could not be decoded.
    #[error("Invalid cursor state: {0}")]
    InvalidCursor(String),

    /// The database was created for a different ordering kind.
    #[error("Index kind mismatch: stored {stored}, requested {requested}")]
    KindMismatch {
        stored: IndexKind,
        requested: IndexKind,
    },

    /// `begin_batch` / `create_schema` while a batch is still open.
    #[error("A batch transaction is already in progress")]
    TransactionInProgress,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A blocking task on the async handle panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map a failed write against `table` to the crate's error taxonomy.
pub(crate) fn classify(err: rusqlite::Error, table: &'static str, file_id: &FileId) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, message) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            return match code.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    StoreError::DuplicateKey {
                        table,
                        file_id: *file_id,
                    }
                }
                _ => StoreError::Constraint(
                    message.clone().unwrap_or_else(|| code.to_string()),
                ),
            };
        }
    }
    StoreError::Sqlite(err)
}
