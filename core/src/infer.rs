//! Structural mapping inference.
//!
//! When no explicit mapping is bundled for a pair of model versions,
//! [`infer_mapping`] tries to align the two models automatically: entities
//! and attributes are matched by name, or by the destination's renaming
//! identifier. Inference refuses anything that would need custom logic.
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
//!         .with_attribute(
//!             AttributeDescription::required("heading", AttributeType::Text)
//!                 .renamed_from("title"),
//!         )
//!         .with_attribute(AttributeDescription::optional("body", AttributeType::Text)),
//! );
//!
//! let mapping = infer_mapping(&v1, &v2).unwrap();
//! assert_eq!(mapping.entity_mappings[0].kind, MappingKind::Transform);
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    AttributeDescription, AttributeType, EntityDescription, EntityMapping, MappingModel,
    SchemaModel, ValueExpression,
};

/// Reasons a mapping cannot be inferred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// An aligned attribute changed its storage type.
    #[error("attribute {entity}.{attribute} changes type from {from} to {to}")]
    TypeChange {
        /// Destination entity.
        entity: String,
        /// Destination attribute.
        attribute: String,
        /// Source type.
        from: AttributeType,
        /// Destination type.
        to: AttributeType,
    },
    /// A new required attribute has no default to fill existing records.
    #[error("attribute {entity}.{attribute} is required, new, and has no default")]
    RequiredWithoutDefault {
        /// Destination entity.
        entity: String,
        /// Destination attribute.
        attribute: String,
    },
    /// An optional attribute became required with no default for nulls.
    #[error("attribute {entity}.{attribute} becomes required without a default")]
    BecomesRequired {
        /// Destination entity.
        entity: String,
        /// Destination attribute.
        attribute: String,
    },
    /// Two destination entities claim the same source entity.
    #[error("source entity {0} is mapped by more than one destination entity")]
    AmbiguousEntity(String),
}

/// Infers a mapping that converts stores of `source` into stores of `destination`.
///
/// # Errors
///
/// Returns a [`MappingError`] when the models cannot be aligned without
/// custom logic: a type change, a new required attribute without default,
/// an optional attribute becoming required without default, or two
/// destination entities claiming the same source entity.
pub fn infer_mapping(
    source: &SchemaModel,
    destination: &SchemaModel,
) -> Result<MappingModel, MappingError> {
    let mut mapping = MappingModel::new(source.model_hash(), destination.model_hash());
    let mut claimed: HashSet<&str> = HashSet::new();

    for dest_entity in &destination.entities {
        let Some(src_entity) = aligned_entity(source, dest_entity) else {
            mapping
                .entity_mappings
                .push(EntityMapping::add(&dest_entity.name));
            continue;
        };

        if !claimed.insert(src_entity.name.as_str()) {
            return Err(MappingError::AmbiguousEntity(src_entity.name.clone()));
        }

        mapping
            .entity_mappings
            .push(infer_entity_mapping(src_entity, dest_entity)?);
    }

    for src_entity in &source.entities {
        if !claimed.contains(src_entity.name.as_str()) {
            mapping
                .entity_mappings
                .push(EntityMapping::remove(&src_entity.name));
        }
    }

    Ok(mapping)
}

fn aligned_entity<'a>(
    source: &'a SchemaModel,
    dest_entity: &EntityDescription,
) -> Option<&'a EntityDescription> {
    dest_entity
        .renaming_id
        .as_deref()
        .and_then(|previous| source.entity(previous))
        .or_else(|| source.entity(&dest_entity.name))
}

fn aligned_attribute<'a>(
    source: &'a EntityDescription,
    dest_attribute: &AttributeDescription,
) -> Option<&'a AttributeDescription> {
    dest_attribute
        .renaming_id
        .as_deref()
        .and_then(|previous| source.attribute(previous))
        .or_else(|| source.attribute(&dest_attribute.name))
}

fn infer_entity_mapping(
    src_entity: &EntityDescription,
    dest_entity: &EntityDescription,
) -> Result<EntityMapping, MappingError> {
    let mut entity_mapping = EntityMapping::transform(&src_entity.name, &dest_entity.name);
    let mut identical = src_entity.name == dest_entity.name
        && src_entity.attributes.len() == dest_entity.attributes.len();

    for dest_attr in &dest_entity.attributes {
        let value = match aligned_attribute(src_entity, dest_attr) {
            Some(src_attr) => {
                check_attribute_change(&dest_entity.name, src_attr, dest_attr)?;
                if src_attr.name != dest_attr.name
                    || src_attr.attribute_type != dest_attr.attribute_type
                    || src_attr.optional != dest_attr.optional
                {
                    identical = false;
                }
                ValueExpression::Source(src_attr.name.clone())
            }
            None => {
                if !dest_attr.optional && dest_attr.default.is_none() {
                    return Err(MappingError::RequiredWithoutDefault {
                        entity: dest_entity.name.clone(),
                        attribute: dest_attr.name.clone(),
                    });
                }
                identical = false;
                ValueExpression::Default
            }
        };
        entity_mapping = entity_mapping.with_attribute(&dest_attr.name, value);
    }

    if identical {
        return Ok(EntityMapping::copy(&dest_entity.name));
    }
    Ok(entity_mapping)
}

fn check_attribute_change(
    entity: &str,
    src_attr: &AttributeDescription,
    dest_attr: &AttributeDescription,
) -> Result<(), MappingError> {
    let widening = src_attr.attribute_type == AttributeType::Integer
        && dest_attr.attribute_type == AttributeType::Double;
    if src_attr.attribute_type != dest_attr.attribute_type && !widening {
        return Err(MappingError::TypeChange {
            entity: entity.to_string(),
            attribute: dest_attr.name.clone(),
            from: src_attr.attribute_type,
            to: dest_attr.attribute_type,
        });
    }
    if src_attr.optional && !dest_attr.optional && dest_attr.default.is_none() {
        return Err(MappingError::BecomesRequired {
            entity: entity.to_string(),
            attribute: dest_attr.name.clone(),
        });
    }
    Ok(())
}
