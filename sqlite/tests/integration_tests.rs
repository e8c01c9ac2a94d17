//! Integration tests: the migration engine driving real SQLite stores.

use std::path::Path;

use store_ladder_core::{
    AttributeDescription, AttributeType, EntityDescription, EntityMapping, EntityMigrationPolicy,
    MappingModel, PolicyContext, PolicyError, PolicyRegistry, Record, SchemaModel, StoreHandle,
    Value, ValueExpression,
};
use store_ladder_engine::{
    MemorySource, MigrationExecutor, MigrationOutcome, Migrator, StoreBackend,
    TransformationResolver, VersionCatalog, VersionCheck, version_name,
};
use store_ladder_sqlite::{SqliteBackend, SqliteStore, metadata_at};
use tempfile::TempDir;

fn v1() -> SchemaModel {
    SchemaModel::new("Notes").with_entity(
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Text))
            .with_attribute(AttributeDescription::optional("views", AttributeType::Integer)),
    )
}

fn v2() -> SchemaModel {
    SchemaModel::new("Notes_2")
        .with_entity(
            EntityDescription::new("Note")
                .with_attribute(AttributeDescription::required("title", AttributeType::Text))
                .with_attribute(AttributeDescription::optional("views", AttributeType::Integer))
                .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
        )
        .with_entity(
            EntityDescription::new("Tag")
                .with_attribute(AttributeDescription::required("label", AttributeType::Text)),
        )
}

fn v3() -> SchemaModel {
    SchemaModel::new("Notes_3")
        .with_entity(
            EntityDescription::new("Note")
                .with_attribute(
                    AttributeDescription::required("heading", AttributeType::Text)
                        .renamed_from("title"),
                )
                .with_attribute(AttributeDescription::optional("views", AttributeType::Double))
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

fn source(models: Vec<SchemaModel>) -> MemorySource {
    let mut source = MemorySource::new();
    for (number, model) in (1u32..).zip(models) {
        source = source.with_model(version_name("Notes", number), model);
    }
    source
}

fn note(title: &str, views: i64) -> Record {
    [
        ("title".to_string(), Value::from(title)),
        ("views".to_string(), Value::Integer(views)),
    ]
    .into_iter()
    .collect()
}

fn seed_v1(path: &Path) {
    let mut store = SqliteStore::create(path, &v1()).unwrap();
    store.insert("Note", &note("first", 3)).unwrap();
    store.insert("Note", &note("second", 0)).unwrap();
    store.close().unwrap();
}

fn migrator(
    dir: &TempDir,
    path: &Path,
    source: MemorySource,
    policies: PolicyRegistry,
) -> Migrator<MemorySource, SqliteBackend> {
    let catalog = VersionCatalog::load(&source, "Notes", None).unwrap();
    Migrator::new(
        StoreHandle::sqlite(path),
        catalog,
        TransformationResolver::new(source).with_namespace("Notes"),
        SqliteBackend::new(),
    )
    .with_executor(MigrationExecutor::new(dir.path().join("scratch")).with_policies(policies))
}

#[test]
fn test_migrates_sqlite_store_through_two_steps() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Notes.sqlite");
    seed_v1(&path);
    let store_id = SqliteStore::open(&path, &v1()).unwrap().store_id().unwrap();

    let migrator = migrator(&dir, &path, source(vec![v1(), v2(), v3()]), PolicyRegistry::new());
    let MigrationOutcome::Migrated(report) = migrator.migrate().unwrap() else {
        panic!("expected a migration");
    };
    assert_eq!((report.from_version, report.to_version), (1, 3));
    assert_eq!(report.intermediates_destroyed, 1);

    let store = SqliteStore::open(&path, &v3()).unwrap();
    let notes = store.fetch_all("Note").unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["heading"], Value::from("first"));
    assert_eq!(notes[0]["views"], Value::Double(3.0));
    assert_eq!(notes[0]["body"], Value::Null);
    assert_eq!(notes[1]["pinned"], Value::Boolean(false));
    assert!(store.fetch_all("Tag").unwrap().is_empty());
    assert_eq!(store.store_id().unwrap(), store_id);

    assert!(!migrator.backup_path().exists());
    assert!(!dir.path().join("Notes.sqlite-wal").exists());
    assert_eq!(std::fs::read_dir(dir.path().join("scratch")).unwrap().count(), 0);
}

#[test]
fn test_current_store_needs_no_migration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Notes.sqlite");
    SqliteStore::create(&path, &v2()).unwrap().close().unwrap();

    let migrator = migrator(&dir, &path, source(vec![v1(), v2()]), PolicyRegistry::new());
    assert_eq!(migrator.check().unwrap(), VersionCheck::UpToDate(2));
    assert!(matches!(
        migrator.migrate().unwrap(),
        MigrationOutcome::NotNeeded(_)
    ));
}

struct RejectSecond;

impl EntityMigrationPolicy for RejectSecond {
    fn create_destination(
        &self,
        _ctx: &PolicyContext<'_>,
        source: &Record,
        destination: Record,
    ) -> Result<Option<Record>, PolicyError> {
        match source.get("title") {
            Some(Value::Text(title)) if title == "second" => {
                Err(PolicyError::new("second note cannot be migrated"))
            }
            _ => Ok(Some(destination)),
        }
    }
}

fn rejecting_migrator(dir: &TempDir, path: &Path) -> Migrator<MemorySource, SqliteBackend> {
    let mut mapping = MappingModel::new(v1().model_hash(), v2().model_hash());
    mapping.entity_mappings.push(
        EntityMapping::transform("Note", "Note")
            .with_attribute("title", ValueExpression::Source("title".into()))
            .with_attribute("views", ValueExpression::Source("views".into()))
            .with_policy("RejectSecond"),
    );
    mapping.entity_mappings.push(EntityMapping::add("Tag"));

    let mut policies = PolicyRegistry::new();
    policies.register_in("Notes", "RejectSecond", RejectSecond);
    migrator(
        dir,
        path,
        source(vec![v1(), v2()]).with_mapping(mapping),
        policies,
    )
}

#[test]
fn test_policy_failure_restores_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Notes.sqlite");
    seed_v1(&path);

    let migrator = rejecting_migrator(&dir, &path);
    let err = migrator.migrate().unwrap_err();
    assert!(err.to_string().contains("second note"), "{err}");

    let store = SqliteStore::open(&path, &v1()).unwrap();
    assert_eq!(
        store.fetch_all("Note").unwrap(),
        vec![note("first", 3), note("second", 0)]
    );
    assert!(!migrator.backup_path().exists());
}

#[test]
fn test_rollback_restores_flushed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Notes.sqlite");
    seed_v1(&path);
    let opened = std::fs::read(&path).unwrap();

    SqliteBackend::new()
        .checkpoint(&StoreHandle::sqlite(&path), &v1())
        .unwrap();
    let flushed = std::fs::read(&path).unwrap();
    assert_ne!(opened, flushed);

    rejecting_migrator(&dir, &path).migrate().unwrap_err();

    assert_eq!(std::fs::read(&path).unwrap(), flushed);
}

#[test]
fn test_backend_metadata_of_foreign_files() {
    let dir = TempDir::new().unwrap();
    let backend = SqliteBackend::new();

    let text = dir.path().join("notes.txt");
    std::fs::write(&text, "not a database").unwrap();
    assert!(
        backend
            .metadata(&StoreHandle::sqlite(&text))
            .unwrap()
            .is_none()
    );
    assert!(metadata_at(&dir.path().join("absent.sqlite")).unwrap().is_none());
}

#[test]
fn test_checkpoint_switches_wal_store_to_rollback_journal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Notes.sqlite");
    seed_v1(&path);
    assert_eq!(SqliteStore::open(&path, &v1()).unwrap().journal_mode().unwrap(), "wal");

    SqliteBackend::new()
        .checkpoint(&StoreHandle::sqlite(&path), &v1())
        .unwrap();

    let store = SqliteStore::open(&path, &v1()).unwrap();
    assert_eq!(store.journal_mode().unwrap(), "delete");
    assert_eq!(store.fetch_all("Note").unwrap().len(), 2);
}

#[test]
fn test_records_only_in_wal_survive_migration() {
    let live_dir = TempDir::new().unwrap();
    let live = live_dir.path().join("Notes.sqlite");
    let mut open_store = SqliteStore::create(&live, &v1()).unwrap();
    open_store.insert("Note", &note("first", 3)).unwrap();
    open_store.insert("Note", &note("second", 0)).unwrap();

    // Copy while the writer is still open, so committed pages sit in the log.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Notes.sqlite");
    let wal = dir.path().join("Notes.sqlite-wal");
    std::fs::copy(&live, &path).unwrap();
    std::fs::copy(live_dir.path().join("Notes.sqlite-wal"), &wal).unwrap();
    assert!(std::fs::metadata(&wal).unwrap().len() > 0);

    let migrator = migrator(&dir, &path, source(vec![v1(), v2()]), PolicyRegistry::new());
    assert_eq!(
        migrator.check().unwrap(),
        VersionCheck::Needed {
            current: 1,
            latest: 2
        }
    );
    assert!(matches!(
        migrator.migrate().unwrap(),
        MigrationOutcome::Migrated(_)
    ));

    let store = SqliteStore::open(&path, &v2()).unwrap();
    let notes = store.fetch_all("Note").unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["title"], Value::from("first"));
    assert_eq!(notes[1]["views"], Value::Integer(0));
    assert!(!wal.exists());

    open_store.close().unwrap();
}
