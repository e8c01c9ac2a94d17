//! Error types for SQLite store operations.
//!
//! Provides a unified error type covering database access, value
//! conversion, model mismatches, and file handling.

use std::path::PathBuf;

use store_ladder_core::{TransformError, ValidationError};
use store_ladder_engine::BackendError;
use thiserror::Error;

/// Errors that can occur during SQLite store operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Value-to-SQL or SQL-to-value conversion failure.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Record transformation failure during a migration step.
    #[error("transformation error: {0}")]
    TransformError(#[from] TransformError),

    /// The model cannot be turned into tables.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A record violates its entity.
    #[error("invalid record for {entity}: {errors:?}")]
    InvalidRecord {
        /// Entity name.
        entity: String,
        /// Violations found.
        errors: Vec<ValidationError>,
    },

    /// The model does not declare the requested entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// A store already exists where a new one was to be created.
    #[error("store already exists at {}", .0.display())]
    StoreExists(PathBuf),

    /// The file holds no store metadata.
    #[error("no store metadata in {}", .0.display())]
    MissingMetadata(PathBuf),

    /// The journal mode could not be switched back to a rollback journal.
    #[error("journal mode of {} stayed {mode}", .path.display())]
    JournalMode {
        /// Store location.
        path: PathBuf,
        /// Mode SQLite reported.
        mode: String,
    },

    /// The store was written by a different model.
    #[error("store at {} was not written by model {model}", .path.display())]
    IncompatibleStore {
        /// Store location.
        path: PathBuf,
        /// Model name used to open it.
        model: String,
    },
}

impl From<SqliteError> for BackendError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::IoError(e) => BackendError::Io(e),
            SqliteError::TransformError(e) => BackendError::Transform(e),
            other => BackendError::Store(Box::new(other)),
        }
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
