//! Transformation resolution between two schema versions.

use store_ladder_core::{MappingModel, infer_mapping};
use tracing::{debug, info};

use crate::catalog::SchemaVersion;
use crate::error::{MigrationError, Result};
use crate::source::MappingSource;

/// Where a resolved mapping came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    /// Authored and bundled with the application.
    Explicit,
    /// Produced by structural inference.
    Inferred,
}

impl MappingOrigin {
    /// Lowercase name, used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingOrigin::Explicit => "explicit",
            MappingOrigin::Inferred => "inferred",
        }
    }
}

/// A mapping plus its origin.
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    /// Mapping with policy names already namespace-qualified.
    pub mapping: MappingModel,
    /// Explicit or inferred.
    pub origin: MappingOrigin,
}

/// Picks the mapping for each pair of versions.
///
/// An explicit mapping whose model hashes match the pair wins. Its policy
/// names are qualified with the configured namespace. Otherwise a mapping
/// is inferred; if that fails too, resolution fails with
/// [`MigrationError::NoMappingFound`].
#[derive(Debug, Clone)]
pub struct TransformationResolver<M> {
    source: M,
    namespace: Option<String>,
}

impl<M: MappingSource> TransformationResolver<M> {
    /// Creates a resolver that looks up explicit mappings in `source`.
    pub fn new(source: M) -> Self {
        Self {
            source,
            namespace: None,
        }
    }

    /// Sets the namespace that qualifies custom policy names.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Namespace that qualifies custom policy names.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Resolves the mapping that turns stores of `from` into stores of `to`.
    pub fn resolve(&self, from: &SchemaVersion, to: &SchemaVersion) -> Result<ResolvedMapping> {
        let source_hash = from.model().model_hash();
        let destination_hash = to.model().model_hash();

        let explicit = self
            .source
            .find_mapping(&source_hash, &destination_hash)
            .map_err(|e| MigrationError::MappingSource {
                from: from.number(),
                to: to.number(),
                source: Box::new(e),
            })?;

        if let Some(mut mapping) = explicit {
            if let Some(namespace) = &self.namespace {
                mapping.qualify_policies(namespace);
            }
            info!(
                from = from.number(),
                to = to.number(),
                "using explicit mapping"
            );
            return Ok(ResolvedMapping {
                mapping,
                origin: MappingOrigin::Explicit,
            });
        }

        debug!(
            from = from.number(),
            to = to.number(),
            "no explicit mapping, inferring"
        );
        match infer_mapping(from.model(), to.model()) {
            Ok(mapping) => {
                info!(
                    from = from.number(),
                    to = to.number(),
                    "using inferred mapping"
                );
                Ok(ResolvedMapping {
                    mapping,
                    origin: MappingOrigin::Inferred,
                })
            }
            Err(reason) => Err(MigrationError::NoMappingFound {
                from: from.number(),
                to: to.number(),
                reason,
            }),
        }
    }
}
