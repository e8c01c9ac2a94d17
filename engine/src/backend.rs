//! Store backend primitives used by the coordinator.

use store_ladder_core::{PolicyRegistry, SchemaModel, StoreHandle, StoreMetadata};

use crate::error::BackendError;
use crate::steps::MigrationStep;

/// Storage-engine operations the migration engine cannot perform itself.
///
/// A store may span several companion files (journal, shared-memory index),
/// so replacing and destroying stores goes through the backend rather than
/// plain file operations on the primary path.
pub trait StoreBackend {
    /// Reads the format metadata persisted in the store at `store`.
    ///
    /// Returns `Ok(None)` when the location holds no valid store.
    fn metadata(&self, store: &StoreHandle) -> Result<Option<StoreMetadata>, BackendError>;

    /// Merges any journaled but unmerged changes into the primary file.
    ///
    /// `model` is the model the store was written with. The store is closed
    /// again before this returns.
    fn checkpoint(&self, store: &StoreHandle, model: &SchemaModel) -> Result<(), BackendError>;

    /// Writes a new store at `output` holding every record of `input`
    /// converted by `step`'s mapping. Must not modify `input`.
    fn transform(
        &self,
        step: &MigrationStep,
        input: &StoreHandle,
        output: &StoreHandle,
        policies: &PolicyRegistry,
    ) -> Result<(), BackendError>;

    /// Replaces the store at `destination` with the one at `source`.
    ///
    /// After success `source` no longer exists and `destination` holds its
    /// data; on failure `destination` must be unchanged.
    fn replace_store(
        &self,
        destination: &StoreHandle,
        source: &StoreHandle,
    ) -> Result<(), BackendError>;

    /// Removes the store at `store` together with its companion files.
    fn destroy_store(&self, store: &StoreHandle) -> Result<(), BackendError>;
}
