//! Error types for the migration engine.
//!
//! Every [`MigrationError`] is terminal for the operation that triggered the
//! migration: the engine never retries, never falls back to another mapping
//! strategy, and never hands back a store it could not migrate safely.
//! Conditions that do not affect the migrated store are reported as
//! [`MigrationWarning`]s instead.

use std::fmt;
use std::path::PathBuf;

use store_ladder_core::{MappingError, TransformError, ValidationError};
use thiserror::Error;

/// Boxed error raised by an externally supplied collaborator.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a store backend primitive.
#[derive(Debug, Error)]
pub enum BackendError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be converted.
    #[error("transformation failed: {0}")]
    Transform(#[from] TransformError),

    /// Backend-specific storage failure.
    #[error("store error: {0}")]
    Store(#[source] SourceError),
}

/// Fatal migration errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Store metadata is present but no catalog version can open the store.
    #[error("unknown store format at {}: no catalog version matches its metadata", .path.display())]
    UnknownStoreFormat {
        /// Live store location.
        path: PathBuf,
    },

    /// The catalog claims a version whose schema artifact cannot be found.
    #[error("schema artifact {name} for version {number} not found")]
    MissingSchemaArtifact {
        /// Version number.
        number: u32,
        /// Resource name searched for.
        name: String,
    },

    /// The schema catalog lookup itself failed.
    #[error("failed to load schema artifact {name}: {source}")]
    SchemaSource {
        /// Resource name being loaded.
        name: String,
        /// Underlying error.
        #[source]
        source: SourceError,
    },

    /// A loaded schema model is structurally invalid.
    #[error("invalid schema model {name}: {}", join_errors(.errors))]
    InvalidModel {
        /// Resource name of the model.
        name: String,
        /// Validation problems found.
        errors: Vec<ValidationError>,
    },

    /// The catalog configuration itself is unusable.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Looking up an explicit mapping failed.
    #[error("failed to look up mapping from version {from} to {to}: {source}")]
    MappingSource {
        /// Source version number.
        from: u32,
        /// Destination version number.
        to: u32,
        /// Underlying error.
        #[source]
        source: SourceError,
    },

    /// Neither an explicit nor an inferred mapping exists between two versions.
    #[error("no transformation mapping from version {from} to {to}: {reason}")]
    NoMappingFound {
        /// Source version number.
        from: u32,
        /// Destination version number.
        to: u32,
        /// Why inference failed.
        reason: MappingError,
    },

    /// The catalog ran out of versions before the target was reached.
    #[error("step chain from version {from} stops at {reached} before reaching {to}")]
    IncompleteChain {
        /// Requested source version.
        from: u32,
        /// Last version reachable.
        reached: u32,
        /// Requested target version.
        to: u32,
    },

    /// Reading the live store's metadata failed.
    #[error("failed to read store metadata at {}: {source}", .path.display())]
    Metadata {
        /// Live store location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: BackendError,
    },

    /// The write-ahead durability flush failed.
    #[error("failed to flush the journal of {}: {source}", .path.display())]
    Checkpoint {
        /// Live store location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: BackendError,
    },

    /// The pre-migration backup could not be written. The live store is untouched.
    #[error("failed to back up {} to {}: {source}", .path.display(), .backup.display())]
    Backup {
        /// Live store location.
        path: PathBuf,
        /// Backup location.
        backup: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Creating the scratch area for intermediate stores failed.
    #[error("failed to prepare scratch directory {}: {source}", .path.display())]
    Scratch {
        /// Scratch directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A migration step failed; the backup has been restored.
    #[error("migration step {from} -> {to} failed: {source}")]
    Step {
        /// Source version number.
        from: u32,
        /// Destination version number.
        to: u32,
        /// Output location the step was writing.
        output: PathBuf,
        /// Underlying error.
        #[source]
        source: BackendError,
    },

    /// Replacing the live store with the migrated store failed; the backup has been restored.
    #[error("failed to replace {} with the migrated store: {source}", .path.display())]
    Swap {
        /// Live store location.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: BackendError,
    },

    /// Restoring the backup after a failure also failed.
    #[error("{cause}; restoring backup {} also failed: {restore}", .backup.display())]
    RestoreFailed {
        /// Original failure.
        cause: Box<MigrationError>,
        /// Backup location that could not be restored.
        backup: PathBuf,
        /// Restore failure.
        restore: BackendError,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Non-fatal condition recorded in a [`MigrationReport`](crate::MigrationReport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationWarning {
    /// The backup of a successfully migrated store could not be deleted.
    BackupCleanup {
        /// Backup location.
        path: PathBuf,
        /// Error message.
        message: String,
    },
    /// A superseded intermediate store could not be destroyed.
    IntermediateCleanup {
        /// Intermediate location.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationWarning::BackupCleanup { path, message } => {
                write!(f, "failed to delete backup {}: {message}", path.display())
            }
            MigrationWarning::IntermediateCleanup { path, message } => {
                write!(
                    f,
                    "failed to destroy intermediate store {}: {message}",
                    path.display()
                )
            }
        }
    }
}

/// Convenience alias for results with [`MigrationError`].
pub type Result<T> = std::result::Result<T, MigrationError>;
