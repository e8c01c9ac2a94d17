//! [`StoreBackend`] implementation for SQLite store files.

use std::io;
use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use store_ladder_core::{
    PolicyRegistry, RecordTransformer, SchemaModel, StoreHandle, StoreMetadata,
};
use store_ladder_engine::fs::{copy_and_overwrite, move_file, remove_file_if_exists};
use store_ladder_engine::{BackendError, MigrationStep, StoreBackend};
use tracing::{debug, warn};

use crate::convert::{fetch_records, insert_record, read_metadata};
use crate::error::{Result, SqliteError};
use crate::store::{companion_paths, initialize, metadata_at};

/// Store backend for SQLite files.
///
/// Each step writes its output in rollback-journal mode, so a finished
/// output is a single self-contained file that can be renamed into place.
#[derive(Debug, Default, Clone)]
pub struct SqliteBackend;

impl SqliteBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }

    fn flush_journal(&self, path: &Path, model: &SchemaModel) -> Result<()> {
        let metadata =
            metadata_at(path)?.ok_or_else(|| SqliteError::MissingMetadata(path.to_path_buf()))?;
        if !model.is_compatible_with(&metadata) {
            return Err(SqliteError::IncompatibleStore {
                path: path.to_path_buf(),
                model: model.name.clone(),
            });
        }

        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=DELETE", [], |row| row.get(0))?;
        conn.close().map_err(|(_, e)| SqliteError::DatabaseError(e))?;
        if !mode.eq_ignore_ascii_case("delete") {
            return Err(SqliteError::JournalMode {
                path: path.to_path_buf(),
                mode,
            });
        }
        debug!(path = %path.display(), "flushed write-ahead log");
        Ok(())
    }

    fn copy_records(
        &self,
        step: &MigrationStep,
        input: &Path,
        output: &Path,
        policies: &PolicyRegistry,
    ) -> Result<()> {
        let source_model = step.source_model();
        let destination_model = step.destination_model();

        let source = Connection::open_with_flags(input, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let source_metadata = read_metadata(&source)?
            .ok_or_else(|| SqliteError::MissingMetadata(input.to_path_buf()))?;

        destroy_files(output)?;
        let mut conn = Connection::open(output)?;
        initialize(
            &mut conn,
            destination_model,
            &source_metadata.rewritten_for(destination_model),
        )?;

        let tx = conn.transaction()?;
        for mapping in &step.mapping().entity_mappings {
            if !mapping.reads_source() {
                continue;
            }
            let transformer = RecordTransformer::new(mapping, destination_model, policies)?;
            let source_name = mapping.source_entity.as_deref().unwrap_or_default();
            let source_entity = source_model
                .entity(source_name)
                .ok_or_else(|| SqliteError::UnknownEntity(source_name.to_string()))?;

            let records = fetch_records(&source, source_entity)?;
            let mut written = 0usize;
            for record in &records {
                if let Some(record) = transformer.transform(record)? {
                    insert_record(&tx, transformer.destination(), &record)?;
                    written += 1;
                }
            }
            debug!(
                mapping = %mapping.name,
                read = records.len(),
                written,
                "converted entity"
            );
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_files(&self, destination: &Path, source: &Path) -> Result<()> {
        // A leftover journal would be replayed into the incoming file.
        for companion in companion_paths(destination) {
            remove_file_if_exists(&companion)?;
        }

        match move_file(source, destination) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                debug!(source = %source.display(), "rename crosses devices, copying");
                copy_and_overwrite(source, destination)?;
                remove_file_if_exists(source)?;
            }
            Err(err) => return Err(err.into()),
        }

        for companion in companion_paths(source) {
            if let Err(err) = remove_file_if_exists(&companion) {
                warn!(path = %companion.display(), error = %err, "failed to remove companion file");
            }
        }
        Ok(())
    }
}

/// Removes the database at `path` and its companion files.
fn destroy_files(path: &Path) -> Result<()> {
    remove_file_if_exists(path)?;
    for companion in companion_paths(path) {
        remove_file_if_exists(&companion)?;
    }
    Ok(())
}

impl StoreBackend for SqliteBackend {
    fn metadata(
        &self,
        store: &StoreHandle,
    ) -> std::result::Result<Option<StoreMetadata>, BackendError> {
        Ok(metadata_at(store.path())?)
    }

    fn checkpoint(
        &self,
        store: &StoreHandle,
        model: &SchemaModel,
    ) -> std::result::Result<(), BackendError> {
        Ok(self.flush_journal(store.path(), model)?)
    }

    fn transform(
        &self,
        step: &MigrationStep,
        input: &StoreHandle,
        output: &StoreHandle,
        policies: &PolicyRegistry,
    ) -> std::result::Result<(), BackendError> {
        Ok(self.copy_records(step, input.path(), output.path(), policies)?)
    }

    fn replace_store(
        &self,
        destination: &StoreHandle,
        source: &StoreHandle,
    ) -> std::result::Result<(), BackendError> {
        Ok(self.replace_files(destination.path(), source.path())?)
    }

    fn destroy_store(&self, store: &StoreHandle) -> std::result::Result<(), BackendError> {
        Ok(destroy_files(store.path())?)
    }
}
