//! Collaborator traits for locating schema artifacts and explicit mappings.

use std::collections::HashMap;
use std::convert::Infallible;

use store_ladder_core::{MappingModel, SchemaModel};

use crate::catalog::version_name;

/// Resolves a version name to its compiled schema model.
pub trait SchemaSource {
    /// Error raised when an artifact exists but cannot be read.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads the model stored under `version_name`.
    ///
    /// Returns `Ok(None)` when no artifact with that name exists.
    fn load_model(&self, version_name: &str) -> Result<Option<SchemaModel>, Self::Error>;

    /// Returns the highest version number with an artifact, probing
    /// `<base>_2`, `<base>_3`, ... until one is missing.
    ///
    /// Returns `0` when not even the base version exists.
    fn latest_version(&self, base_name: &str) -> Result<u32, Self::Error> {
        if self.load_model(base_name)?.is_none() {
            return Ok(0);
        }
        let mut latest = 1;
        while self
            .load_model(&version_name(base_name, latest + 1))?
            .is_some()
        {
            latest += 1;
        }
        Ok(latest)
    }
}

/// Finds explicitly authored mappings bundled with the application.
pub trait MappingSource {
    /// Error raised when a mapping exists but cannot be read.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the mapping whose model hash pair matches exactly.
    fn find_mapping(
        &self,
        source_hash: &str,
        destination_hash: &str,
    ) -> Result<Option<MappingModel>, Self::Error>;
}

/// In-memory schema and mapping source.
///
/// Useful for embedding models in a binary and for tests.
///
/// # Examples
///
/// ```
/// use store_ladder_core::*;
/// use store_ladder_engine::{MemorySource, SchemaSource};
///
/// let source = MemorySource::new()
///     .with_model("Notes", SchemaModel::new("Notes"))
///     .with_model("Notes_2", SchemaModel::new("Notes_2"));
/// assert_eq!(source.latest_version("Notes").unwrap(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    models: HashMap<String, SchemaModel>,
    mappings: Vec<MappingModel>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model under a version name.
    pub fn with_model(mut self, version_name: impl Into<String>, model: SchemaModel) -> Self {
        self.models.insert(version_name.into(), model);
        self
    }

    /// Adds an explicit mapping.
    pub fn with_mapping(mut self, mapping: MappingModel) -> Self {
        self.mappings.push(mapping);
        self
    }
}

impl SchemaSource for MemorySource {
    type Error = Infallible;

    fn load_model(&self, version_name: &str) -> Result<Option<SchemaModel>, Self::Error> {
        Ok(self.models.get(version_name).cloned())
    }
}

impl MappingSource for MemorySource {
    type Error = Infallible;

    fn find_mapping(
        &self,
        source_hash: &str,
        destination_hash: &str,
    ) -> Result<Option<MappingModel>, Self::Error> {
        Ok(self
            .mappings
            .iter()
            .find(|m| m.matches(source_hash, destination_hash))
            .cloned())
    }
}
