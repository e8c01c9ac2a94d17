//! Store handles and persisted store metadata.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::SchemaModel;

/// Metadata key holding the backend kind that wrote the store.
pub const STORE_TYPE_KEY: &str = "store_type";
/// Metadata key holding the store's unique identifier.
pub const STORE_ID_KEY: &str = "store_id";
/// Metadata key holding the name of the model that last wrote the store.
pub const MODEL_NAME_KEY: &str = "model_name";
/// Prefix of the per-entity version hash keys.
pub const ENTITY_HASH_PREFIX: &str = "entity_hash.";

/// Storage backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// On-disk transactional SQLite file.
    #[default]
    Sqlite,
    /// Ephemeral in-memory store.
    InMemory,
}

impl StoreType {
    /// Only on-disk stores survive a restart, so only they are migrated.
    pub fn is_migratable(&self) -> bool {
        matches!(self, StoreType::Sqlite)
    }

    /// Stable name recorded under [`STORE_TYPE_KEY`].
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Sqlite => "sqlite",
            StoreType::InMemory => "in_memory",
        }
    }
}

/// A store location plus its backend kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreHandle {
    path: PathBuf,
    store_type: StoreType,
}

impl StoreHandle {
    /// Creates a handle for `path`.
    pub fn new(path: impl Into<PathBuf>, store_type: StoreType) -> Self {
        Self {
            path: path.into(),
            store_type,
        }
    }

    /// Creates a handle for an on-disk SQLite store.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::new(path, StoreType::Sqlite)
    }

    /// Location of the store's primary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backend kind.
    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    /// Returns a handle of the same kind at another location.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(path, self.store_type)
    }
}

/// Format metadata persisted inside a store.
///
/// A flat string map. The entity hash keys are what version detection
/// compares against each catalog model.
///
/// # Examples
///
/// ```
/// use store_ladder_core::*;
///
/// let model = SchemaModel::new("Notes").with_entity(EntityDescription::new("Note"));
/// let metadata = StoreMetadata::for_model(&model, "sqlite", "abc");
/// assert_eq!(metadata.get(STORE_ID_KEY), Some("abc"));
/// assert_eq!(metadata.entity_hashes().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreMetadata {
    entries: BTreeMap<String, String>,
}

impl StoreMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the metadata a store written by `model` carries.
    pub fn for_model(model: &SchemaModel, store_type: &str, store_id: &str) -> Self {
        let mut metadata = Self::new();
        metadata.insert(STORE_TYPE_KEY, store_type);
        metadata.insert(STORE_ID_KEY, store_id);
        metadata.insert(MODEL_NAME_KEY, &model.name);
        for (entity, hash) in model.entity_hashes() {
            metadata.insert(format!("{ENTITY_HASH_PREFIX}{entity}"), hash);
        }
        metadata
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `true` if no entries are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns entity name to version hash for every recorded entity.
    pub fn entity_hashes(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENTITY_HASH_PREFIX)
                    .map(|entity| (entity.to_string(), value.clone()))
            })
            .collect()
    }

    /// Returns a copy with the entity hashes replaced by `model`'s.
    ///
    /// Identity keys (store id, store type) are kept.
    pub fn rewritten_for(&self, model: &SchemaModel) -> Self {
        let mut entries: BTreeMap<String, String> = self
            .entries
            .iter()
            .filter(|(key, _)| !key.starts_with(ENTITY_HASH_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.insert(MODEL_NAME_KEY.to_string(), model.name.clone());
        for (entity, hash) in model.entity_hashes() {
            entries.insert(format!("{ENTITY_HASH_PREFIX}{entity}"), hash);
        }
        Self { entries }
    }
}

impl FromIterator<(String, String)> for StoreMetadata {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
