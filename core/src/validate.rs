//! Model and record validation.
//!
//! Validates structural invariants of schema models before they are used to
//! create or migrate a store, and checks individual records against the
//! destination entity while a migration step writes them.
//!
//! # Examples
//!
//! ```
//! use store_ladder_core::*;
//!
//! let model = SchemaModel::new("Notes").with_entity(
//!     EntityDescription::new("Note")
//!         .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
//! );
//! assert!(validate_model(&model).is_empty());
//!
//! // Invalid: attribute name is not an identifier
//! let bad = SchemaModel::new("Notes").with_entity(
//!     EntityDescription::new("Note")
//!         .with_attribute(AttributeDescription::required("two words", AttributeType::Text)),
//! );
//! assert!(!validate_model(&bad).is_empty());
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::{EntityDescription, Record, SchemaModel};

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex must compile"));

/// Column name reserved for the row identifier in table-backed stores.
pub const RESERVED_PRIMARY_KEY: &str = "_pk";
/// Prefix reserved for bookkeeping tables.
pub const RESERVED_PREFIX: &str = "ladder_";

/// Model and record validation errors.
///
/// Each variant describes a specific structural problem. The `Display` impl
/// provides a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Model name is empty or whitespace-only.
    #[error("model name cannot be empty")]
    EmptyModelName,
    /// Entity or attribute name is not a plain identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// Entity or attribute name collides with a reserved name.
    #[error("reserved name: {0}")]
    ReservedName(String),
    /// Two entities share a name.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    /// Two attributes of the same entity share a name.
    #[error("duplicate attribute {entity}.{attribute}")]
    DuplicateAttribute {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        attribute: String,
    },
    /// A declared default does not fit the attribute type.
    #[error("default of {entity}.{attribute} does not match its type")]
    DefaultTypeMismatch {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        attribute: String,
    },
    /// A record carries an attribute the entity does not declare.
    #[error("unknown attribute {entity}.{attribute}")]
    UnknownAttribute {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        attribute: String,
    },
    /// A required attribute is missing or null.
    #[error("required attribute {entity}.{attribute} is missing")]
    MissingRequired {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        attribute: String,
    },
    /// A value does not fit the declared attribute type.
    #[error("attribute {entity}.{attribute} expects {expected}")]
    TypeMismatch {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        attribute: String,
        /// Declared type name.
        expected: String,
    },
}

/// Returns `true` if `name` can be used as an entity or attribute name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Validates a schema model.
///
/// Checks for an empty model name, invalid or reserved identifiers,
/// duplicate entities and attributes, and defaults that do not fit their
/// attribute type. Stops at the first problem found.
pub fn validate_model(model: &SchemaModel) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if model.name.trim().is_empty() {
        errors.push(ValidationError::EmptyModelName);
        return errors;
    }

    let mut seen_entities: HashSet<&str> = HashSet::new();
    for entity in &model.entities {
        if let Some(err) = check_name(&entity.name) {
            errors.push(err);
            return errors;
        }
        if !seen_entities.insert(entity.name.as_str()) {
            errors.push(ValidationError::DuplicateEntity(entity.name.clone()));
            return errors;
        }
        errors.extend(validate_attributes(entity));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

fn check_name(name: &str) -> Option<ValidationError> {
    if !is_valid_identifier(name) {
        return Some(ValidationError::InvalidIdentifier(name.to_string()));
    }
    if name == RESERVED_PRIMARY_KEY || name.starts_with(RESERVED_PREFIX) {
        return Some(ValidationError::ReservedName(name.to_string()));
    }
    None
}

fn validate_attributes(entity: &EntityDescription) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for attribute in &entity.attributes {
        if let Some(err) = check_name(&attribute.name) {
            errors.push(err);
            return errors;
        }
        if !seen.insert(attribute.name.as_str()) {
            errors.push(ValidationError::DuplicateAttribute {
                entity: entity.name.clone(),
                attribute: attribute.name.clone(),
            });
            return errors;
        }
        if let Some(default) = &attribute.default {
            if default.is_null() || !attribute.attribute_type.accepts(default) {
                errors.push(ValidationError::DefaultTypeMismatch {
                    entity: entity.name.clone(),
                    attribute: attribute.name.clone(),
                });
                return errors;
            }
        }
    }

    errors
}

/// Validates one record against the entity it is about to be stored as.
///
/// Reports every problem found, not just the first, so a failing migration
/// step can describe the whole record.
pub fn validate_record(entity: &EntityDescription, record: &Record) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for name in record.keys() {
        if entity.attribute(name).is_none() {
            errors.push(ValidationError::UnknownAttribute {
                entity: entity.name.clone(),
                attribute: name.clone(),
            });
        }
    }

    for attribute in &entity.attributes {
        match record.get(&attribute.name) {
            None => {
                if !attribute.optional {
                    errors.push(ValidationError::MissingRequired {
                        entity: entity.name.clone(),
                        attribute: attribute.name.clone(),
                    });
                }
            }
            Some(value) if value.is_null() => {
                if !attribute.optional {
                    errors.push(ValidationError::MissingRequired {
                        entity: entity.name.clone(),
                        attribute: attribute.name.clone(),
                    });
                }
            }
            Some(value) => {
                if !attribute.attribute_type.accepts(value) {
                    errors.push(ValidationError::TypeMismatch {
                        entity: entity.name.clone(),
                        attribute: attribute.name.clone(),
                        expected: attribute.attribute_type.to_string(),
                    });
                }
            }
        }
    }

    errors
}
