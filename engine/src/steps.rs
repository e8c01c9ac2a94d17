//! Step chains between two schema versions.

use store_ladder_core::{MappingModel, SchemaModel};
use tracing::debug;

use crate::catalog::{SchemaVersion, VersionCatalog};
use crate::error::{MigrationError, Result};
use crate::resolver::{MappingOrigin, TransformationResolver};
use crate::source::MappingSource;

/// One migration between two versions with its resolved mapping.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    source: SchemaVersion,
    destination: SchemaVersion,
    mapping: MappingModel,
    origin: MappingOrigin,
}

impl MigrationStep {
    /// Creates a step. `source` must be older than `destination`.
    pub fn new(
        source: SchemaVersion,
        destination: SchemaVersion,
        mapping: MappingModel,
        origin: MappingOrigin,
    ) -> Self {
        debug_assert!(source < destination);
        Self {
            source,
            destination,
            mapping,
            origin,
        }
    }

    /// Version the step reads.
    pub fn source_version(&self) -> &SchemaVersion {
        &self.source
    }

    /// Version the step writes.
    pub fn destination_version(&self) -> &SchemaVersion {
        &self.destination
    }

    /// Model of the input store.
    pub fn source_model(&self) -> &SchemaModel {
        self.source.model()
    }

    /// Model of the output store.
    pub fn destination_model(&self) -> &SchemaModel {
        self.destination.model()
    }

    /// Mapping applied to every record.
    pub fn mapping(&self) -> &MappingModel {
        &self.mapping
    }

    /// Whether the mapping was authored or inferred.
    pub fn origin(&self) -> MappingOrigin {
        self.origin
    }
}

/// Builds chains of adjacent-version steps.
#[derive(Debug)]
pub struct StepBuilder<'a, M> {
    catalog: &'a VersionCatalog,
    resolver: &'a TransformationResolver<M>,
}

impl<'a, M: MappingSource> StepBuilder<'a, M> {
    /// Creates a builder over `catalog`.
    pub fn new(catalog: &'a VersionCatalog, resolver: &'a TransformationResolver<M>) -> Self {
        Self { catalog, resolver }
    }

    /// Returns the steps that migrate a store from `from` to `to`.
    ///
    /// Empty when `from >= to`. Every step is resolved before this returns,
    /// so a missing mapping anywhere in the chain fails the whole build.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::IncompleteChain`] if the catalog runs out
    /// of versions before `to`, or the resolver's error for the first pair
    /// that cannot be mapped.
    pub fn build_steps(
        &self,
        from: &SchemaVersion,
        to: &SchemaVersion,
    ) -> Result<Vec<MigrationStep>> {
        let mut steps = Vec::new();
        if from >= to {
            return Ok(steps);
        }

        let mut current = from;
        while current < to {
            let Some(next) = self.catalog.next_version(current) else {
                return Err(MigrationError::IncompleteChain {
                    from: from.number(),
                    reached: current.number(),
                    to: to.number(),
                });
            };

            let resolved = self.resolver.resolve(current, next)?;
            debug!(
                from = current.number(),
                to = next.number(),
                origin = resolved.origin.as_str(),
                "built migration step"
            );
            steps.push(MigrationStep::new(
                current.clone(),
                next.clone(),
                resolved.mapping,
                resolved.origin,
            ));
            current = next;
        }

        Ok(steps)
    }
}
