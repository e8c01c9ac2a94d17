//! A directory of versioned model artifacts and mapping files.
//!
//! Layout:
//!
//! ```text
//! models/
//!   Notes.yaml                    version 1, source form
//!   Notes_2.lmc                   version 2, precompiled (preferred)
//!   Notes_2.yaml                  version 2, source form (ignored)
//!   Notes_3.yaml
//!   Notes_to_Notes_3.mapping.yaml explicit mapping between two versions
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use store_ladder_core::{EntityMapping, MappingModel, SchemaModel};
use store_ladder_engine::{MappingSource, SchemaSource};
use tracing::{debug, trace, warn};

use crate::compile::{COMPILED_EXTENSION, SOURCE_EXTENSION, read_compiled, read_source};
use crate::error::{CatalogError, Result};

/// File name suffix of explicit mapping files.
pub const MAPPING_SUFFIX: &str = ".mapping.yaml";

/// An explicit mapping as authored on disk.
///
/// Models are named by version name rather than by hash; the hashes are
/// computed from the named artifacts when the mapping is looked up.
///
/// ```yaml
/// source: Notes_2
/// destination: Notes_3
/// entity_mappings:
///   - name: Note
///     kind: transform
///     source_entity: Note
///     destination_entity: Note
///     policy: SplitTitle
///     attribute_mappings:
///       - destination: heading
///         value: { source: title }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingArtifact {
    /// Version name of the source model.
    pub source: String,
    /// Version name of the destination model.
    pub destination: String,
    /// Entity mappings, applied in order.
    #[serde(default)]
    pub entity_mappings: Vec<EntityMapping>,
}

impl MappingArtifact {
    /// Reads a mapping file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(reader)?)
    }
}

/// Model and mapping artifacts stored in one directory.
#[derive(Debug, Clone)]
pub struct ResourceDirectory {
    root: PathBuf,
}

impl ResourceDirectory {
    /// Opens the directory at `root`. Nothing is read until a lookup.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being searched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the precompiled artifact for `version_name`.
    pub fn compiled_path(&self, version_name: &str) -> PathBuf {
        self.root
            .join(format!("{version_name}.{COMPILED_EXTENSION}"))
    }

    /// Path of the source artifact for `version_name`.
    pub fn source_path(&self, version_name: &str) -> PathBuf {
        self.root.join(format!("{version_name}.{SOURCE_EXTENSION}"))
    }

    /// Every `*.mapping.yaml` file, sorted by name.
    pub fn mapping_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            let is_mapping = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(MAPPING_SUFFIX));
            if is_mapping && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Model hash of `version_name`, memoized in `hashes` for one lookup.
    fn model_hash(
        &self,
        hashes: &mut HashMap<String, Option<String>>,
        version_name: &str,
    ) -> Result<Option<String>> {
        if let Some(hash) = hashes.get(version_name) {
            return Ok(hash.clone());
        }
        let hash = self.read_model(version_name)?.map(|model| model.model_hash());
        hashes.insert(version_name.to_string(), hash.clone());
        Ok(hash)
    }

    fn read_model(&self, version_name: &str) -> Result<Option<SchemaModel>> {
        let compiled = self.compiled_path(version_name);
        if compiled.is_file() {
            trace!(path = %compiled.display(), "reading precompiled model");
            return read_compiled(&compiled).map(Some);
        }
        let source = self.source_path(version_name);
        if source.is_file() {
            trace!(path = %source.display(), "reading source model");
            return read_source(&source).map(Some);
        }
        Ok(None)
    }
}

impl SchemaSource for ResourceDirectory {
    type Error = CatalogError;

    fn load_model(&self, version_name: &str) -> Result<Option<SchemaModel>> {
        self.read_model(version_name)
    }
}

impl MappingSource for ResourceDirectory {
    type Error = CatalogError;

    fn find_mapping(
        &self,
        source_hash: &str,
        destination_hash: &str,
    ) -> Result<Option<MappingModel>> {
        let mut hashes = HashMap::new();
        for path in self.mapping_files()? {
            let artifact = MappingArtifact::load(&path)?;
            let Some(from) = self.model_hash(&mut hashes, &artifact.source)? else {
                warn!(
                    path = %path.display(),
                    model = %artifact.source,
                    "mapping names a missing model, skipped"
                );
                continue;
            };
            if from != source_hash {
                continue;
            }
            let Some(to) = self.model_hash(&mut hashes, &artifact.destination)? else {
                warn!(
                    path = %path.display(),
                    model = %artifact.destination,
                    "mapping names a missing model, skipped"
                );
                continue;
            };
            if to == destination_hash {
                debug!(path = %path.display(), "found explicit mapping");
                let mut mapping = MappingModel::new(from, to);
                mapping.entity_mappings = artifact.entity_mappings;
                return Ok(Some(mapping));
            }
        }
        Ok(None)
    }
}
