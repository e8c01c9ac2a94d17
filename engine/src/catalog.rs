//! The version catalog: every known schema version, in order.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use store_ladder_core::{SchemaModel, StoreMetadata, validate_model};
use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::source::SchemaSource;

/// Resource name of version `number` of a model family.
///
/// Version 1 uses the base name itself; later versions append `_<number>`.
///
/// # Examples
///
/// ```
/// use store_ladder_engine::version_name;
///
/// assert_eq!(version_name("Notes", 1), "Notes");
/// assert_eq!(version_name("Notes", 3), "Notes_3");
/// ```
pub fn version_name(base_name: &str, number: u32) -> String {
    if number <= 1 {
        base_name.to_string()
    } else {
        format!("{base_name}_{number}")
    }
}

/// One schema version.
///
/// Ordered and compared by `number` only.
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    number: u32,
    name: String,
    model: Arc<SchemaModel>,
}

impl SchemaVersion {
    /// Creates a version.
    pub fn new(number: u32, name: impl Into<String>, model: Arc<SchemaModel>) -> Self {
        Self {
            number,
            name: name.into(),
            model,
        }
    }

    /// Position in the catalog, starting at 1.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled model.
    pub fn model(&self) -> &SchemaModel {
        &self.model
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number.cmp(&other.number)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (v{})", self.name, self.number)
    }
}

/// All schema versions of one model family, from version 1 to the latest.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    base_name: String,
    versions: Vec<SchemaVersion>,
}

impl VersionCatalog {
    /// Loads versions `1..=latest` of `base_name` from `source`.
    ///
    /// When `latest` is `None` it is detected with
    /// [`SchemaSource::latest_version`]. Every model is validated.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::MissingSchemaArtifact`] when a version in
    /// range has no artifact, [`MigrationError::InvalidModel`] when a model
    /// fails validation, and [`MigrationError::InvalidCatalog`] when no
    /// version exists at all.
    pub fn load<S: SchemaSource>(
        source: &S,
        base_name: &str,
        latest: Option<u32>,
    ) -> Result<Self> {
        let latest = match latest {
            Some(latest) => latest,
            None => source
                .latest_version(base_name)
                .map_err(|e| MigrationError::SchemaSource {
                    name: base_name.to_string(),
                    source: Box::new(e),
                })?,
        };

        let mut models = Vec::new();
        for number in 1..=latest {
            let name = version_name(base_name, number);
            let model = source
                .load_model(&name)
                .map_err(|e| MigrationError::SchemaSource {
                    name: name.clone(),
                    source: Box::new(e),
                })?
                .ok_or_else(|| MigrationError::MissingSchemaArtifact {
                    number,
                    name: name.clone(),
                })?;
            models.push(model);
        }

        let catalog = Self::from_models(base_name, models)?;
        debug!(
            base = base_name,
            versions = catalog.versions.len(),
            "loaded version catalog"
        );
        Ok(catalog)
    }

    /// Builds a catalog from models in version order.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidCatalog`] when `models` is empty and
    /// [`MigrationError::InvalidModel`] when a model fails validation.
    pub fn from_models(base_name: &str, models: Vec<SchemaModel>) -> Result<Self> {
        if models.is_empty() {
            return Err(MigrationError::InvalidCatalog(format!(
                "no schema versions found for {base_name}"
            )));
        }

        let mut versions = Vec::with_capacity(models.len());
        for (number, model) in (1u32..).zip(models) {
            let name = version_name(base_name, number);
            let errors = validate_model(&model);
            if !errors.is_empty() {
                return Err(MigrationError::InvalidModel { name, errors });
            }
            versions.push(SchemaVersion::new(number, name, Arc::new(model)));
        }

        Ok(Self {
            base_name: base_name.to_string(),
            versions,
        })
    }

    /// Base resource name of the family.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// All versions in ascending order.
    pub fn versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    /// Version 1.
    pub fn first_version(&self) -> &SchemaVersion {
        &self.versions[0]
    }

    /// Highest known version.
    pub fn latest_version(&self) -> &SchemaVersion {
        &self.versions[self.versions.len() - 1]
    }

    /// Version with the given number.
    pub fn version(&self, number: u32) -> Option<&SchemaVersion> {
        let index = number.checked_sub(1)? as usize;
        self.versions.get(index)
    }

    /// Successor of `version`, if the catalog has one.
    pub fn next_version(&self, version: &SchemaVersion) -> Option<&SchemaVersion> {
        self.version(version.number() + 1)
    }

    /// First version, scanning upward from version 1, whose model can open
    /// a store with `metadata`.
    pub fn compatible_version(&self, metadata: &StoreMetadata) -> Option<&SchemaVersion> {
        let mut current = Some(self.first_version());
        while let Some(version) = current {
            if version.model().is_compatible_with(metadata) {
                return Some(version);
            }
            current = self.next_version(version);
        }
        None
    }
}
