//! JSON-file store backend and fixtures shared by the engine tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use store_ladder_core::{
    AttributeDescription, AttributeType, EntityDescription, MappingKind, PolicyRegistry, Record,
    RecordTransformer, SchemaModel, StoreHandle, StoreMetadata, Value,
};
use store_ladder_engine::{BackendError, MemorySource, MigrationStep, StoreBackend};

/// Whole store serialized as one JSON document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonStore {
    pub metadata: StoreMetadata,
    pub entities: BTreeMap<String, Vec<Record>>,
}

impl JsonStore {
    pub fn create(model: &SchemaModel) -> Self {
        Self {
            metadata: StoreMetadata::for_model(model, "sqlite", "test-store"),
            entities: model
                .entities
                .iter()
                .map(|e| (e.name.clone(), Vec::new()))
                .collect(),
        }
    }

    pub fn with_records(mut self, entity: &str, records: Vec<Record>) -> Self {
        self.entities.insert(entity.to_string(), records);
        self
    }

    pub fn read(path: &Path) -> Self {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    pub fn write(&self, path: &Path) {
        fs::write(path, serde_json::to_vec_pretty(self).unwrap()).unwrap();
    }
}

/// Store backend over [`JsonStore`] files, with call counters and fault injection.
#[derive(Default)]
pub struct JsonBackend {
    pub checkpoints: Cell<usize>,
    pub transforms: Cell<usize>,
    pub replaces: Cell<usize>,
    pub destroyed: RefCell<Vec<PathBuf>>,
    /// Fail the step whose destination version has this number.
    pub fail_step_to: Cell<Option<u32>>,
    /// Fail the next `replace_store` call once.
    pub fail_next_swap: Cell<bool>,
}

fn injected(message: &str) -> BackendError {
    BackendError::Store(message.into())
}

impl StoreBackend for JsonBackend {
    fn metadata(&self, store: &StoreHandle) -> Result<Option<StoreMetadata>, BackendError> {
        if !store.path().exists() {
            return Ok(None);
        }
        let bytes = fs::read(store.path())?;
        Ok(serde_json::from_slice::<JsonStore>(&bytes)
            .ok()
            .map(|s| s.metadata))
    }

    fn checkpoint(&self, _store: &StoreHandle, _model: &SchemaModel) -> Result<(), BackendError> {
        self.checkpoints.set(self.checkpoints.get() + 1);
        Ok(())
    }

    fn transform(
        &self,
        step: &MigrationStep,
        input: &StoreHandle,
        output: &StoreHandle,
        policies: &PolicyRegistry,
    ) -> Result<(), BackendError> {
        self.transforms.set(self.transforms.get() + 1);

        let source = JsonStore::read(input.path());
        let destination_model = step.destination_model();
        let mut result = JsonStore {
            metadata: source.metadata.rewritten_for(destination_model),
            entities: destination_model
                .entities
                .iter()
                .map(|e| (e.name.clone(), Vec::new()))
                .collect(),
        };

        // Partial output first, so a failing step leaves something to clean up.
        result.write(output.path());

        if self.fail_step_to.get() == Some(step.destination_version().number()) {
            return Err(injected("injected step failure"));
        }

        for mapping in &step.mapping().entity_mappings {
            if mapping.kind == MappingKind::Remove || mapping.kind == MappingKind::Add {
                continue;
            }
            let transformer = RecordTransformer::new(mapping, destination_model, policies)?;
            let source_entity = mapping.source_entity.as_deref().unwrap_or_default();
            let records = source
                .entities
                .get(source_entity)
                .cloned()
                .unwrap_or_default();

            let mut produced = Vec::with_capacity(records.len());
            for record in &records {
                if let Some(record) = transformer.transform(record)? {
                    produced.push(record);
                }
            }
            result
                .entities
                .insert(transformer.destination().name.clone(), produced);
        }

        result.write(output.path());
        Ok(())
    }

    fn replace_store(
        &self,
        destination: &StoreHandle,
        source: &StoreHandle,
    ) -> Result<(), BackendError> {
        self.replaces.set(self.replaces.get() + 1);
        if self.fail_next_swap.replace(false) {
            return Err(injected("injected swap failure"));
        }
        fs::rename(source.path(), destination.path())?;
        Ok(())
    }

    fn destroy_store(&self, store: &StoreHandle) -> Result<(), BackendError> {
        match fs::remove_file(store.path()) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.destroyed.borrow_mut().push(store.path().to_path_buf());
        Ok(())
    }
}

/// Version 1: notes with a title.
pub fn notes_v1() -> SchemaModel {
    SchemaModel::new("Notes").with_entity(
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
    )
}

/// Version 2: adds an optional body and a tag entity.
pub fn notes_v2() -> SchemaModel {
    SchemaModel::new("Notes_2")
        .with_entity(
            EntityDescription::new("Note")
                .with_attribute(AttributeDescription::required("title", AttributeType::Text))
                .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
        )
        .with_entity(
            EntityDescription::new("Tag")
                .with_attribute(AttributeDescription::required("label", AttributeType::Text)),
        )
}

/// Version 3: renames title to heading and adds a defaulted pinned flag.
pub fn notes_v3() -> SchemaModel {
    SchemaModel::new("Notes_3")
        .with_entity(
            EntityDescription::new("Note")
                .with_attribute(
                    AttributeDescription::required("heading", AttributeType::Text)
                        .renamed_from("title"),
                )
                .with_attribute(AttributeDescription::optional("body", AttributeType::Text))
                .with_attribute(
                    AttributeDescription::required("pinned", AttributeType::Boolean)
                        .with_default(false),
                ),
        )
        .with_entity(
            EntityDescription::new("Tag")
                .with_attribute(AttributeDescription::required("label", AttributeType::Text)),
        )
}

/// Version 3 with an incompatible type change, for which nothing can be inferred.
pub fn notes_v3_unmappable() -> SchemaModel {
    SchemaModel::new("Notes_3").with_entity(
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Integer))
            .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
    )
}

pub fn source(models: Vec<SchemaModel>) -> MemorySource {
    let mut source = MemorySource::new();
    for (number, model) in (1u32..).zip(models) {
        source = source.with_model(store_ladder_engine::version_name("Notes", number), model);
    }
    source
}

pub fn note(title: &str) -> Record {
    [("title".to_string(), Value::from(title))]
        .into_iter()
        .collect()
}

/// Writes a version-1 store with two notes and returns its handle.
pub fn seed_v1_store(dir: &Path) -> StoreHandle {
    let path = dir.join("Notes.json");
    JsonStore::create(&notes_v1())
        .with_records("Note", vec![note("first"), note("second")])
        .write(&path);
    StoreHandle::sqlite(path)
}

/// Number of entries in `dir`, zero if it does not exist.
pub fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
