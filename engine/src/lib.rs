//! Progressive store migration engine.
//!
//! Upgrades an on-disk store from whatever schema version wrote it to the
//! latest version in the catalog, one adjacent version at a time:
//!
//! - [`VersionCatalog`]: ordered [`SchemaVersion`]s loaded from a
//!   [`SchemaSource`], and detection of a store's version from its metadata.
//! - [`TransformationResolver`]: explicit mapping from a [`MappingSource`],
//!   else an inferred one, else [`MigrationError::NoMappingFound`].
//! - [`StepBuilder`]: the chain of [`MigrationStep`]s between two versions.
//! - [`MigrationExecutor`]: runs one step into a fresh scratch store.
//! - [`Migrator`]: backup, step chain, swap, cleanup, and rollback.
//!
//! Storage-specific work (metadata, journal flush, record conversion,
//! replace, destroy) is delegated to a [`StoreBackend`].

mod backend;
mod catalog;
mod coordinator;
mod error;
mod executor;
pub mod fs;
mod resolver;
mod source;
mod steps;

pub use backend::StoreBackend;
pub use catalog::{SchemaVersion, VersionCatalog, version_name};
pub use coordinator::{
    BACKUP_SUFFIX, MigrationOutcome, MigrationReport, MigrationState, Migrator, StepReport,
    VersionCheck,
};
pub use error::{BackendError, MigrationError, MigrationWarning, Result, SourceError};
pub use executor::{MigrationExecutor, StepOutput, default_scratch_dir};
pub use resolver::{MappingOrigin, ResolvedMapping, TransformationResolver};
pub use source::{MappingSource, MemorySource, SchemaSource};
pub use steps::{MigrationStep, StepBuilder};
