//! SQLite store files: creation, record access, and metadata inspection.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags};
use store_ladder_core::{
    EntityDescription, Record, STORE_ID_KEY, SchemaModel, StoreMetadata, StoreType,
    validate_record,
};
use store_ladder_engine::fs::append_suffix;
use tracing::debug;
use uuid::Uuid;

use crate::convert::{fetch_records, insert_record, read_metadata, write_metadata};
use crate::error::{Result, SqliteError};
use crate::schema::generate_schema_sql;

/// Suffixes of the files SQLite keeps next to a database.
pub const COMPANION_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Companion files of the database at `path`.
pub fn companion_paths(path: &Path) -> Vec<PathBuf> {
    COMPANION_SUFFIXES
        .iter()
        .map(|suffix| append_suffix(path, suffix))
        .collect()
}

/// Reads the metadata of the store at `path` without modifying it.
///
/// Returns `Ok(None)` when the file does not exist, is not an SQLite
/// database, or has no metadata table.
pub fn metadata_at(path: &Path) -> Result<Option<StoreMetadata>> {
    if !path.is_file() {
        return Ok(None);
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    match read_metadata(&conn) {
        Ok(metadata) => Ok(metadata),
        Err(SqliteError::DatabaseError(rusqlite::Error::SqliteFailure(e, _)))
            if e.code == ErrorCode::NotADatabase =>
        {
            debug!(path = %path.display(), "not an SQLite database");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Creates the tables and metadata of `model` inside one transaction.
pub(crate) fn initialize(
    conn: &mut Connection,
    model: &SchemaModel,
    metadata: &StoreMetadata,
) -> Result<()> {
    let sql = generate_schema_sql(model)?;
    let tx = conn.transaction()?;
    tx.execute_batch(&sql)?;
    write_metadata(&tx, metadata)?;
    tx.commit()?;
    Ok(())
}

/// An open SQLite store written with one schema model.
///
/// # Examples
///
/// ```no_run
/// use store_ladder_core::*;
/// use store_ladder_sqlite::SqliteStore;
///
/// let model = SchemaModel::new("Notes").with_entity(
///     EntityDescription::new("Note")
///         .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
/// );
/// let mut store = SqliteStore::create("Notes.sqlite", &model).unwrap();
///
/// let mut note = Record::new();
/// note.insert("title".into(), Value::from("hello"));
/// store.insert("Note", &note).unwrap();
/// assert_eq!(store.fetch_all("Note").unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    model: SchemaModel,
}

impl SqliteStore {
    /// Creates a new store for `model` at `path`, in write-ahead-log mode.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::StoreExists`] if a file already exists at
    /// `path`, or [`SqliteError::InvalidModel`] if the model is invalid.
    pub fn create(path: impl AsRef<Path>, model: &SchemaModel) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(SqliteError::StoreExists(path.to_path_buf()));
        }

        let mut conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        let store_id = Uuid::new_v4().to_string();
        let metadata = StoreMetadata::for_model(model, StoreType::Sqlite.as_str(), &store_id);
        initialize(&mut conn, model, &metadata)?;
        debug!(path = %path.display(), model = %model.name, journal_mode = %mode, "created store");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            model: model.clone(),
        })
    }

    /// Opens an existing store written with `model`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::MissingMetadata`] if the file is not a store,
    /// or [`SqliteError::IncompatibleStore`] if a different model wrote it.
    pub fn open(path: impl AsRef<Path>, model: &SchemaModel) -> Result<Self> {
        let path = path.as_ref();
        let metadata =
            metadata_at(path)?.ok_or_else(|| SqliteError::MissingMetadata(path.to_path_buf()))?;
        if !model.is_compatible_with(&metadata) {
            return Err(SqliteError::IncompatibleStore {
                path: path.to_path_buf(),
                model: model.name.clone(),
            });
        }

        Ok(Self {
            conn: Connection::open(path)?,
            path: path.to_path_buf(),
            model: model.clone(),
        })
    }

    /// Location of the primary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Model the store was opened with.
    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    /// Unique identifier recorded when the store was created.
    pub fn store_id(&self) -> Result<Option<String>> {
        Ok(self
            .metadata()?
            .and_then(|m| m.get(STORE_ID_KEY).map(str::to_string)))
    }

    /// Stored metadata.
    pub fn metadata(&self) -> Result<Option<StoreMetadata>> {
        read_metadata(&self.conn)
    }

    /// Validates and inserts one record, returning its row identifier.
    pub fn insert(&mut self, entity: &str, record: &Record) -> Result<i64> {
        let entity = self.entity(entity)?;
        let errors = validate_record(entity, record);
        if !errors.is_empty() {
            return Err(SqliteError::InvalidRecord {
                entity: entity.name.clone(),
                errors,
            });
        }
        insert_record(&self.conn, entity, record)
    }

    /// Reads every record of `entity` in insertion order.
    pub fn fetch_all(&self, entity: &str) -> Result<Vec<Record>> {
        fetch_records(&self.conn, self.entity(entity)?)
    }

    /// Current journal mode, lowercase (`wal`, `delete`, ...).
    pub fn journal_mode(&self) -> Result<String> {
        Ok(self
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
    }

    /// Closes the connection.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| SqliteError::DatabaseError(e))
    }

    fn entity(&self, name: &str) -> Result<&EntityDescription> {
        self.model
            .entity(name)
            .ok_or_else(|| SqliteError::UnknownEntity(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_ladder_core::{AttributeDescription, AttributeType, Value};
    use tempfile::TempDir;

    fn model() -> SchemaModel {
        SchemaModel::new("Notes").with_entity(
            EntityDescription::new("Note")
                .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
        )
    }

    #[test]
    fn test_create_insert_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Notes.sqlite");

        let mut store = SqliteStore::create(&path, &model()).unwrap();
        let record: Record = [("title".to_string(), Value::from("a"))].into_iter().collect();
        store.insert("Note", &record).unwrap();
        assert_eq!(store.journal_mode().unwrap(), "wal");
        assert!(store.store_id().unwrap().is_some());
        store.close().unwrap();

        let store = SqliteStore::open(&path, &model()).unwrap();
        assert_eq!(store.fetch_all("Note").unwrap(), vec![record]);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Notes.sqlite");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            SqliteStore::create(&path, &model()),
            Err(SqliteError::StoreExists(_))
        ));
    }

    #[test]
    fn test_insert_validates_record() {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::create(dir.path().join("Notes.sqlite"), &model()).unwrap();
        assert!(matches!(
            store.insert("Note", &Record::new()),
            Err(SqliteError::InvalidRecord { .. })
        ));
        assert!(matches!(
            store.insert("Tag", &Record::new()),
            Err(SqliteError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_metadata_at_non_store_files() {
        let dir = TempDir::new().unwrap();
        assert!(metadata_at(&dir.path().join("missing")).unwrap().is_none());

        let junk = dir.path().join("junk.sqlite");
        std::fs::write(&junk, vec![7u8; 4096]).unwrap();
        assert!(metadata_at(&junk).unwrap().is_none());

        let plain = dir.path().join("plain.sqlite");
        Connection::open(&plain)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();
        assert!(metadata_at(&plain).unwrap().is_none());
    }

    #[test]
    fn test_companion_paths() {
        let paths = companion_paths(Path::new("/data/Notes.sqlite"));
        assert_eq!(paths[0], Path::new("/data/Notes.sqlite-wal"));
        assert_eq!(paths.len(), 3);
    }
}
