//! Transformation mappings between two schema model versions.
//!
//! A [`MappingModel`] describes how every destination entity is produced
//! from the source store. It is either authored explicitly (and bundled with
//! the application as a mapping artifact) or inferred structurally by
//! [`infer_mapping`](crate::infer_mapping).
//!
//! # Example
//!
//! ```
//! use store_ladder_core::*;
//!
//! let mut mapping = MappingModel::new("src-hash", "dst-hash");
//! mapping.entity_mappings.push(
//!     EntityMapping::transform("Note", "Note")
//!         .with_attribute("heading", ValueExpression::Source("title".into()))
//!         .with_policy("NoteSplitPolicy"),
//! );
//!
//! mapping.qualify_policies("notes-app");
//! assert_eq!(
//!     mapping.entity_mappings[0].policy.as_deref(),
//!     Some("notes_app.NoteSplitPolicy")
//! );
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Value;

static NAMESPACE_SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ .\-]").expect("static regex must compile"));

/// How an entity mapping produces destination records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// Source records are copied attribute by attribute, unchanged.
    Copy,
    /// Source records are rewritten through attribute mappings.
    Transform,
    /// The destination entity is new; no records are produced.
    Add,
    /// The source entity is dropped; its records are discarded.
    Remove,
}

/// Expression producing one destination attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpression {
    /// Value of the named source attribute.
    Source(String),
    /// A fixed value.
    Constant(Value),
    /// The destination attribute's declared default (or `Null`).
    Default,
}

/// Maps one destination attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMapping {
    /// Destination attribute name.
    pub destination: String,
    /// Expression evaluated against the source record.
    pub value: ValueExpression,
}

/// Maps one source entity onto one destination entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    /// Mapping name, unique within a [`MappingModel`].
    pub name: String,
    /// Production strategy.
    pub kind: MappingKind,
    /// Entity read from the source store (absent for [`MappingKind::Add`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity: Option<String>,
    /// Entity written to the destination store (absent for [`MappingKind::Remove`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_entity: Option<String>,
    /// Attribute mappings for [`MappingKind::Transform`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_mappings: Vec<AttributeMapping>,
    /// Name of a custom [`EntityMigrationPolicy`](crate::EntityMigrationPolicy).
    ///
    /// Stored relative in mapping artifacts and qualified with the running
    /// application's namespace by [`MappingModel::qualify_policies`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl EntityMapping {
    /// Creates a copy mapping for an entity that is unchanged.
    pub fn copy(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            name: format!("{entity}To{entity}"),
            kind: MappingKind::Copy,
            source_entity: Some(entity.clone()),
            destination_entity: Some(entity),
            attribute_mappings: Vec::new(),
            policy: None,
        }
    }

    /// Creates a transform mapping with no attribute mappings yet.
    pub fn transform(source: impl Into<String>, destination: impl Into<String>) -> Self {
        let source = source.into();
        let destination = destination.into();
        Self {
            name: format!("{source}To{destination}"),
            kind: MappingKind::Transform,
            source_entity: Some(source),
            destination_entity: Some(destination),
            attribute_mappings: Vec::new(),
            policy: None,
        }
    }

    /// Creates a mapping for a destination entity with no source.
    pub fn add(destination: impl Into<String>) -> Self {
        let destination = destination.into();
        Self {
            name: format!("Add{destination}"),
            kind: MappingKind::Add,
            source_entity: None,
            destination_entity: Some(destination),
            attribute_mappings: Vec::new(),
            policy: None,
        }
    }

    /// Creates a mapping that drops a source entity.
    pub fn remove(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            name: format!("Remove{source}"),
            kind: MappingKind::Remove,
            source_entity: Some(source),
            destination_entity: None,
            attribute_mappings: Vec::new(),
            policy: None,
        }
    }

    /// Adds an attribute mapping (builder style).
    pub fn with_attribute(
        mut self,
        destination: impl Into<String>,
        value: ValueExpression,
    ) -> Self {
        self.attribute_mappings.push(AttributeMapping {
            destination: destination.into(),
            value,
        });
        self
    }

    /// Sets the custom policy name (builder style).
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Returns `true` if this mapping reads records from the source store.
    pub fn reads_source(&self) -> bool {
        matches!(self.kind, MappingKind::Copy | MappingKind::Transform)
    }
}

/// A full transformation mapping between two model versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingModel {
    /// [`SchemaModel::model_hash`](crate::SchemaModel::model_hash) of the source model.
    pub source_hash: String,
    /// [`SchemaModel::model_hash`](crate::SchemaModel::model_hash) of the destination model.
    pub destination_hash: String,
    /// Entity mappings, applied in order.
    #[serde(default)]
    pub entity_mappings: Vec<EntityMapping>,
}

impl MappingModel {
    /// Creates a mapping with no entity mappings.
    pub fn new(source_hash: impl Into<String>, destination_hash: impl Into<String>) -> Self {
        Self {
            source_hash: source_hash.into(),
            destination_hash: destination_hash.into(),
            entity_mappings: Vec::new(),
        }
    }

    /// Returns `true` if this mapping converts exactly `source` into `destination`.
    pub fn matches(&self, source_hash: &str, destination_hash: &str) -> bool {
        self.source_hash == source_hash && self.destination_hash == destination_hash
    }

    /// Prefixes every relative policy name with the sanitized `namespace`.
    ///
    /// Policy names are authored relative to the application so that one
    /// mapping artifact serves every build target. Names that already carry
    /// the namespace prefix are left unchanged.
    pub fn qualify_policies(&mut self, namespace: &str) {
        let namespace = sanitize_namespace(namespace);
        let prefix = format!("{namespace}.");
        for mapping in &mut self.entity_mappings {
            if let Some(policy) = &mapping.policy {
                if !policy.starts_with(&prefix) {
                    mapping.policy = Some(format!("{prefix}{policy}"));
                }
            }
        }
    }

    /// Returns the names of all policies referenced by entity mappings.
    pub fn policy_names(&self) -> impl Iterator<Item = &str> {
        self.entity_mappings
            .iter()
            .filter_map(|m| m.policy.as_deref())
    }
}

/// Replaces spaces, dashes, and dots in an application namespace with `_`.
///
/// # Examples
///
/// ```
/// use store_ladder_core::sanitize_namespace;
///
/// assert_eq!(sanitize_namespace("My App-2.beta"), "My_App_2_beta");
/// ```
pub fn sanitize_namespace(namespace: &str) -> String {
    NAMESPACE_SPECIAL_CHARS.replace_all(namespace, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_policies_is_idempotent() {
        let mut mapping = MappingModel::new("a", "b");
        mapping
            .entity_mappings
            .push(EntityMapping::transform("Note", "Note").with_policy("Split"));
        mapping.entity_mappings.push(EntityMapping::copy("Tag"));

        mapping.qualify_policies("notes.app");
        mapping.qualify_policies("notes.app");

        let names: Vec<&str> = mapping.policy_names().collect();
        assert_eq!(names, vec!["notes_app.Split"]);
    }

    #[test]
    fn test_matches_requires_both_hashes() {
        let mapping = MappingModel::new("a", "b");
        assert!(mapping.matches("a", "b"));
        assert!(!mapping.matches("b", "a"));
        assert!(!mapping.matches("a", "c"));
    }

    #[test]
    fn test_mapping_json_shape() {
        let json = serde_json::json!({
            "source_hash": "aaa",
            "destination_hash": "bbb",
            "entity_mappings": [
                {
                    "name": "NoteToNote",
                    "kind": "transform",
                    "source_entity": "Note",
                    "destination_entity": "Note",
                    "attribute_mappings": [
                        { "destination": "heading", "value": { "source": "title" } },
                        { "destination": "pinned", "value": { "constant": false } },
                        { "destination": "rank", "value": "default" }
                    ],
                    "policy": "SplitPolicy"
                },
                { "name": "RemoveDraft", "kind": "remove", "source_entity": "Draft" }
            ]
        });
        let mapping: MappingModel = serde_json::from_value(json).unwrap();

        assert_eq!(mapping.entity_mappings.len(), 2);
        let attributes = &mapping.entity_mappings[0].attribute_mappings;
        assert_eq!(attributes[0].value, ValueExpression::Source("title".into()));
        assert_eq!(
            attributes[1].value,
            ValueExpression::Constant(Value::Boolean(false))
        );
        assert_eq!(attributes[2].value, ValueExpression::Default);
        assert_eq!(mapping.entity_mappings[1].kind, MappingKind::Remove);
        assert!(!mapping.entity_mappings[1].reads_source());
    }
}
