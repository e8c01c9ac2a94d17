//! Core schema model and transformation types for progressive store migration.
//!
//! This crate defines the foundational, I/O-free types shared by the
//! migration engine, the resource catalog, and the store backends:
//!
//! - [`SchemaModel`]: the compiled description of one schema version
//!   ([`EntityDescription`]s made of [`AttributeDescription`]s), with
//!   per-entity version hashes and a store compatibility check.
//! - [`StoreMetadata`] / [`StoreHandle`]: what a store records about the
//!   model that wrote it, and where a store lives.
//! - [`MappingModel`]: how data of one version becomes data of the next,
//!   authored explicitly or produced by [`infer_mapping`].
//! - [`EntityMigrationPolicy`]: custom per-entity hooks, looked up by
//!   namespace-qualified name in a [`PolicyRegistry`].
//! - [`RecordTransformer`]: applies one entity mapping to source records.
//!
//! Validation ([`validate_model`], [`validate_record`]) catches structural
//! errors such as duplicate entities, reserved names, and records that
//! violate their destination entity.
//!
//! # Example
//!
//! ```
//! use store_ladder_core::*;
//!
//! let v1 = SchemaModel::new("Notes").with_entity(
//!     EntityDescription::new("Note")
//!         .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
//! );
//! let v2 = SchemaModel::new("Notes_2").with_entity(
//!     EntityDescription::new("Note")
//!         .with_attribute(AttributeDescription::required("title", AttributeType::Text))
//!         .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
//! );
//! assert!(validate_model(&v2).is_empty());
//!
//! let metadata = StoreMetadata::for_model(&v1, "sqlite", "store-1");
//! assert!(v1.is_compatible_with(&metadata));
//! assert!(!v2.is_compatible_with(&metadata));
//!
//! let mapping = infer_mapping(&v1, &v2).unwrap();
//! assert_eq!(mapping.source_hash, v1.model_hash());
//! ```

mod infer;
mod mapping;
mod policy;
mod store;
mod transform;
mod types;
mod validate;

pub use infer::{MappingError, infer_mapping};
pub use mapping::{
    AttributeMapping, EntityMapping, MappingKind, MappingModel, ValueExpression, sanitize_namespace,
};
pub use policy::{EntityMigrationPolicy, PolicyContext, PolicyError, PolicyRegistry};
pub use store::*;
pub use transform::{RecordTransformer, TransformError};
pub use types::*;
pub use validate::{
    RESERVED_PREFIX, RESERVED_PRIMARY_KEY, ValidationError, is_valid_identifier, validate_model,
    validate_record,
};
