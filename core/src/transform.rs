//! Record-level application of an entity mapping.
//!
//! Store backends read source records and hand them to a
//! [`RecordTransformer`], which evaluates the attribute mappings, runs the
//! entity's custom policy if one is named, and validates the result against
//! the destination entity.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    EntityDescription, EntityMapping, EntityMigrationPolicy, MappingKind, PolicyContext,
    PolicyError, PolicyRegistry, Record, SchemaModel, Value, ValidationError, ValueExpression,
    validate_record,
};

/// Errors raised while converting records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// A mapping that produces records does not name a destination entity.
    #[error("entity mapping {0} has no destination entity")]
    MissingDestination(String),
    /// A mapping names an entity the destination model does not declare.
    #[error("entity mapping {mapping} targets unknown entity {entity}")]
    UnknownEntity {
        /// Mapping name.
        mapping: String,
        /// Entity name.
        entity: String,
    },
    /// A mapping references a policy nobody registered.
    #[error("policy {0} is not registered")]
    UnknownPolicy(String),
    /// A custom policy raised an error.
    #[error("policy {policy} failed: {source}")]
    Policy {
        /// Qualified policy name.
        policy: String,
        /// Error raised by the policy.
        #[source]
        source: PolicyError,
    },
    /// A produced record violates the destination entity.
    #[error("record rejected by {entity}: {}", join_errors(.errors))]
    InvalidRecord {
        /// Destination entity.
        entity: String,
        /// Every violation found in the record.
        errors: Vec<ValidationError>,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Applies one entity mapping to source records.
///
/// # Examples
///
/// ```
/// use store_ladder_core::*;
///
/// let destination = SchemaModel::new("Notes_2").with_entity(
///     EntityDescription::new("Note")
///         .with_attribute(AttributeDescription::required("heading", AttributeType::Text))
///         .with_attribute(
///             AttributeDescription::required("pinned", AttributeType::Boolean)
///                 .with_default(false),
///         ),
/// );
/// let mapping = EntityMapping::transform("Note", "Note")
///     .with_attribute("heading", ValueExpression::Source("title".into()));
///
/// let transformer =
///     RecordTransformer::new(&mapping, &destination, &PolicyRegistry::new()).unwrap();
/// let mut source = Record::new();
/// source.insert("title".into(), Value::from("hello"));
///
/// let record = transformer.transform(&source).unwrap().unwrap();
/// assert_eq!(record["heading"], Value::from("hello"));
/// assert_eq!(record["pinned"], Value::Boolean(false));
/// ```
pub struct RecordTransformer<'a> {
    mapping: &'a EntityMapping,
    destination: &'a EntityDescription,
    policy: Option<(String, Arc<dyn EntityMigrationPolicy>)>,
}

impl<'a> RecordTransformer<'a> {
    /// Resolves the destination entity and policy of `mapping`.
    ///
    /// Resolution happens before any record is read so that a misconfigured
    /// mapping fails the step without partial output.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MissingDestination`],
    /// [`TransformError::UnknownEntity`], or [`TransformError::UnknownPolicy`].
    pub fn new(
        mapping: &'a EntityMapping,
        destination_model: &'a SchemaModel,
        policies: &PolicyRegistry,
    ) -> Result<Self, TransformError> {
        let entity_name = mapping
            .destination_entity
            .as_deref()
            .ok_or_else(|| TransformError::MissingDestination(mapping.name.clone()))?;
        let destination = destination_model.entity(entity_name).ok_or_else(|| {
            TransformError::UnknownEntity {
                mapping: mapping.name.clone(),
                entity: entity_name.to_string(),
            }
        })?;

        let policy = match &mapping.policy {
            Some(name) => {
                let policy = policies
                    .get(name)
                    .ok_or_else(|| TransformError::UnknownPolicy(name.clone()))?;
                Some((name.clone(), policy))
            }
            None => None,
        };

        Ok(Self {
            mapping,
            destination,
            policy,
        })
    }

    /// Entity the produced records are stored as.
    pub fn destination(&self) -> &EntityDescription {
        self.destination
    }

    /// Converts one source record.
    ///
    /// Returns `Ok(None)` when the entity's policy drops the record.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Policy`] if the policy fails, or
    /// [`TransformError::InvalidRecord`] if the result violates the
    /// destination entity.
    pub fn transform(&self, source: &Record) -> Result<Option<Record>, TransformError> {
        let mapped = match self.mapping.kind {
            MappingKind::Copy => self.copy_record(source),
            _ => self.map_record(source),
        };

        let produced = match &self.policy {
            Some((name, policy)) => {
                let ctx = PolicyContext {
                    mapping: self.mapping,
                    destination: self.destination,
                };
                policy
                    .create_destination(&ctx, source, mapped)
                    .map_err(|source| TransformError::Policy {
                        policy: name.clone(),
                        source,
                    })?
            }
            None => Some(mapped),
        };

        let Some(record) = produced else {
            return Ok(None);
        };

        let errors = validate_record(self.destination, &record);
        if !errors.is_empty() {
            return Err(TransformError::InvalidRecord {
                entity: self.destination.name.clone(),
                errors,
            });
        }
        Ok(Some(record))
    }

    fn copy_record(&self, source: &Record) -> Record {
        self.destination
            .attributes
            .iter()
            .map(|attr| {
                let value = source.get(&attr.name).cloned().unwrap_or_default();
                (attr.name.clone(), value)
            })
            .collect()
    }

    fn map_record(&self, source: &Record) -> Record {
        let mut record = Record::new();

        for attr in &self.destination.attributes {
            let expression = self
                .mapping
                .attribute_mappings
                .iter()
                .find(|m| m.destination == attr.name)
                .map(|m| &m.value);

            let value = match expression {
                Some(ValueExpression::Source(name)) => {
                    source.get(name).cloned().unwrap_or_default()
                }
                Some(ValueExpression::Constant(value)) => value.clone(),
                Some(ValueExpression::Default) | None => Value::Null,
            };

            let value = match (&value, &attr.default) {
                (Value::Null, Some(default)) => default.clone(),
                _ => value,
            };
            record.insert(attr.name.clone(), value);
        }

        record
    }
}
