//! Versioned schema resources and configuration for progressive store migration.
//!
//! This crate supplies the on-disk collaborators of the migration engine:
//!
//! - [`ResourceDirectory`]: finds model artifacts by version name
//!   (precompiled `.lmc` preferred over source `.yaml`) and explicit
//!   `*.mapping.yaml` files by model hash pair.
//! - [`compile_model`] / [`compile_all`]: validate source models and write
//!   the precompiled form.
//! - [`LadderConfig`]: YAML configuration for one migrated store.
//!
//! # Quick start
//!
//! ```no_run
//! use store_ladder_catalog::{LadderConfig, ResourceDirectory};
//! use store_ladder_engine::VersionCatalog;
//!
//! let config = LadderConfig::load("ladder.yml").unwrap();
//! let resources = ResourceDirectory::new(&config.model_directory);
//! let catalog =
//!     VersionCatalog::load(&resources, &config.model_name, config.latest_version).unwrap();
//! println!("latest version: {}", catalog.latest_version());
//! ```

mod compile;
mod config;
mod directory;
mod error;

pub use compile::{
    COMPILED_EXTENSION, SOURCE_EXTENSION, compile_all, compile_model, read_compiled, read_source,
    write_compiled,
};
pub use config::LadderConfig;
pub use directory::{MAPPING_SUFFIX, MappingArtifact, ResourceDirectory};
pub use error::{CatalogError, Result};
