//! SQLite store backend for store-ladder.
//!
//! Each entity of a [`SchemaModel`](store_ladder_core::SchemaModel) is stored
//! in its own table, and the store's format metadata (store type, identifier,
//! per-entity version hashes) lives in a key/value table next to them.
//!
//! - **`schema`**: SQL generation for a model
//! - **`convert`**: record ↔ row conversion and metadata access
//! - **`store`**: [`SqliteStore`] for creating and reading stores
//! - **`backend`**: [`SqliteBackend`], the engine's
//!   [`StoreBackend`](store_ladder_engine::StoreBackend)
//!
//! # Quick start
//!
//! ```no_run
//! use store_ladder_core::{SchemaModel, StoreHandle};
//! use store_ladder_engine::{MemorySource, Migrator, TransformationResolver, VersionCatalog};
//! use store_ladder_sqlite::SqliteBackend;
//!
//! # fn models() -> MemorySource { MemorySource::new() }
//! let source = models();
//! let catalog = VersionCatalog::load(&source, "Notes", None).unwrap();
//! let migrator = Migrator::new(
//!     StoreHandle::sqlite("Notes.sqlite"),
//!     catalog,
//!     TransformationResolver::new(source),
//!     SqliteBackend::new(),
//! );
//! migrator.migrate().unwrap();
//! ```

mod backend;
mod convert;
mod error;
mod schema;
mod store;

pub use backend::SqliteBackend;
pub use convert::{fetch_records, insert_record, read_metadata, write_metadata};
pub use error::{Result, SqliteError};
pub use schema::{METADATA_TABLE, column_type, generate_entity_sql, generate_schema_sql};
pub use store::{COMPANION_SUFFIXES, SqliteStore, companion_paths, metadata_at};
