//! Migration configuration for one store.
//!
//! # Example YAML
//!
//! ```yaml
//! model_name: Notes
//! model_directory: models
//! store_path: data/Notes.sqlite
//! store_type: sqlite
//! latest_version: 3
//! namespace: notes-app
//! scratch_directory: /tmp/notes-migration
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use store_ladder_core::{StoreHandle, StoreType};

use crate::error::{CatalogError, Result};

/// Where a store and its model family live, and how to migrate it.
///
/// # Examples
///
/// ```
/// # use store_ladder_catalog::LadderConfig;
/// let config: LadderConfig = serde_yaml::from_str(
///     "model_name: Notes\nmodel_directory: models\nstore_path: Notes.sqlite\n",
/// )
/// .unwrap();
/// assert!(config.validate().is_ok());
/// assert!(config.latest_version.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Base resource name of the model family (version 1's name).
    pub model_name: String,
    /// Directory holding model artifacts and mapping files.
    pub model_directory: PathBuf,
    /// Live store location.
    pub store_path: PathBuf,
    /// Backend kind of the live store.
    #[serde(default)]
    pub store_type: StoreType,
    /// Latest version number; detected from the model directory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<u32>,
    /// Application namespace that qualifies custom policy names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Directory for intermediate stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_directory: Option<PathBuf>,
}

impl LadderConfig {
    /// Creates a configuration with only the required fields set.
    pub fn new(
        model_name: impl Into<String>,
        model_directory: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            model_directory: model_directory.into(),
            store_path: store_path.into(),
            store_type: StoreType::default(),
            latest_version: None,
            namespace: None,
            scratch_directory: None,
        }
    }

    /// Loads and validates configuration from a YAML file.
    ///
    /// Relative paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](CatalogError::IoError) if the file cannot be
    /// read, [`YamlError`](CatalogError::YamlError) if parsing fails, or
    /// [`InvalidConfig`](CatalogError::InvalidConfig) if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;

        let base = path.parent().unwrap_or(Path::new(""));
        Ok(config.resolved_against(base))
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks field values.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(CatalogError::InvalidConfig(
                "model_name cannot be empty".to_string(),
            ));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(CatalogError::InvalidConfig(
                "store_path cannot be empty".to_string(),
            ));
        }
        if self.latest_version == Some(0) {
            return Err(CatalogError::InvalidConfig(
                "latest_version must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns a copy with relative paths joined onto `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |path: PathBuf| {
            if path.is_relative() {
                base.join(path)
            } else {
                path
            }
        };
        self.model_directory = resolve(self.model_directory);
        self.store_path = resolve(self.store_path);
        self.scratch_directory = self.scratch_directory.map(resolve);
        self
    }

    /// Handle of the live store.
    pub fn store_handle(&self) -> StoreHandle {
        StoreHandle::new(&self.store_path, self.store_type)
    }
}
