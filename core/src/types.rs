//! Schema model type definitions.
//!
//! This module defines the data model used to describe a store's logical
//! structure at one point in time. A [`SchemaModel`] is the compiled schema
//! artifact the version catalog hands out; the engine never looks inside it
//! beyond the compatibility check and the per-entity version hashes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::StoreMetadata;

/// Storage type of an attribute.
///
/// # Examples
///
/// ```
/// use store_ladder_core::{AttributeType, Value};
///
/// assert!(AttributeType::Integer.accepts(&Value::Integer(3)));
/// assert!(!AttributeType::Integer.accepts(&Value::Text("3".into())));
/// assert!(AttributeType::Text.accepts(&Value::Null));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point number.
    Double,
    /// UTF-8 string.
    Text,
    /// Boolean flag.
    Boolean,
    /// Opaque byte string.
    Blob,
}

impl AttributeType {
    /// Stable name used in version hashes and SQL column affinities.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Integer => "integer",
            AttributeType::Double => "double",
            AttributeType::Text => "text",
            AttributeType::Boolean => "boolean",
            AttributeType::Blob => "blob",
        }
    }

    /// Returns `true` if `value` may be stored in an attribute of this type.
    ///
    /// `Null` is accepted by every type; optionality is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (AttributeType::Integer, Value::Integer(_))
                | (AttributeType::Double, Value::Double(_))
                | (AttributeType::Double, Value::Integer(_))
                | (AttributeType::Text, Value::Text(_))
                | (AttributeType::Boolean, Value::Boolean(_))
                | (AttributeType::Blob, Value::Blob(_))
        )
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean value. Listed before `Integer` so untagged JSON `true`
    /// does not collapse into a number.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Double(f64),
    /// String value.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One persisted object: attribute name to value.
pub type Record = BTreeMap<String, Value>;

/// Description of an entity attribute.
///
/// # Examples
///
/// ```
/// use store_ladder_core::{AttributeDescription, AttributeType};
///
/// let title = AttributeDescription::required("title", AttributeType::Text)
///     .with_default("untitled");
/// assert!(!title.optional);
/// assert!(title.default.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescription {
    /// Attribute name (also the column name in table-backed stores).
    pub name: String,
    /// Declared storage type.
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Whether the attribute may hold `Null`.
    #[serde(default)]
    pub optional: bool,
    /// Value used when a migration creates the attribute without a source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Name this attribute had in the previous model version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renaming_id: Option<String>,
}

impl AttributeDescription {
    /// Creates a non-optional attribute.
    pub fn required(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: false,
            default: None,
            renaming_id: None,
        }
    }

    /// Creates an optional attribute.
    pub fn optional(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, attribute_type)
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks this attribute as renamed from `previous`.
    pub fn renamed_from(mut self, previous: impl Into<String>) -> Self {
        self.renaming_id = Some(previous.into());
        self
    }
}

/// Description of an entity (a record type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    /// Entity name.
    pub name: String,
    /// Attributes in declaration order.
    #[serde(default)]
    pub attributes: Vec<AttributeDescription>,
    /// Name this entity had in the previous model version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renaming_id: Option<String>,
    /// Extra input to the version hash, used to force a new version when
    /// the structure is unchanged but the data must be transformed anyway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_hash_modifier: Option<String>,
}

impl EntityDescription {
    /// Creates an entity with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            renaming_id: None,
            version_hash_modifier: None,
        }
    }

    /// Adds an attribute (builder style).
    pub fn with_attribute(mut self, attribute: AttributeDescription) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Marks this entity as renamed from `previous`.
    pub fn renamed_from(mut self, previous: impl Into<String>) -> Self {
        self.renaming_id = Some(previous.into());
        self
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns the lowercase hex SHA-256 version hash of this entity.
    ///
    /// Only the entity name, hash modifier, and each attribute's name, type
    /// and optionality contribute. Defaults and renaming identifiers do not,
    /// so adding a default never changes the store's detected version.
    ///
    /// # Examples
    ///
    /// ```
    /// use store_ladder_core::{AttributeDescription, AttributeType, EntityDescription};
    ///
    /// let a = EntityDescription::new("Note")
    ///     .with_attribute(AttributeDescription::required("title", AttributeType::Text));
    /// let b = EntityDescription::new("Note").with_attribute(
    ///     AttributeDescription::required("title", AttributeType::Text).with_default("x"),
    /// );
    /// assert_eq!(a.version_hash(), b.version_hash());
    /// ```
    pub fn version_hash(&self) -> String {
        let mut attributes: Vec<&AttributeDescription> = self.attributes.iter().collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = Sha256::new();
        hasher.update(b"entity:");
        hasher.update(self.name.as_bytes());
        hasher.update(b"\nmodifier:");
        hasher.update(self.version_hash_modifier.as_deref().unwrap_or("").as_bytes());
        for attribute in attributes {
            hasher.update(b"\nattribute:");
            hasher.update(attribute.name.as_bytes());
            hasher.update(b":");
            hasher.update(attribute.attribute_type.as_str().as_bytes());
            hasher.update(if attribute.optional { b":optional" } else { b":required" });
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A compiled schema model: the full logical structure of one version.
///
/// # Examples
///
/// ```
/// use store_ladder_core::*;
///
/// let model = SchemaModel::new("Notes").with_entity(
///     EntityDescription::new("Note")
///         .with_attribute(AttributeDescription::required("title", AttributeType::Text)),
/// );
/// let metadata = StoreMetadata::for_model(&model, "sqlite", "store-1");
/// assert!(model.is_compatible_with(&metadata));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Model name (usually the catalog base name).
    pub name: String,
    /// Entities in declaration order.
    #[serde(default)]
    pub entities: Vec<EntityDescription>,
}

impl SchemaModel {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    /// Adds an entity (builder style).
    pub fn with_entity(mut self, entity: EntityDescription) -> Self {
        self.entities.push(entity);
        self
    }

    /// Looks up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Returns entity name to version hash for every entity.
    pub fn entity_hashes(&self) -> BTreeMap<String, String> {
        self.entities
            .iter()
            .map(|e| (e.name.clone(), e.version_hash()))
            .collect()
    }

    /// Returns a hash identifying the whole model.
    ///
    /// Derived from the sorted entity hashes, so two models that can open
    /// the same stores share a model hash. Mapping artifacts are keyed by it.
    pub fn model_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, hash) in self.entity_hashes() {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(hash.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Returns `true` if this model can open a store described by
    /// `metadata` without transformation.
    ///
    /// The store's recorded entity hashes must match this model's exactly:
    /// same entity set, same hash per entity.
    pub fn is_compatible_with(&self, metadata: &StoreMetadata) -> bool {
        metadata.entity_hashes() == self.entity_hashes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_entity() -> EntityDescription {
        EntityDescription::new("Note")
            .with_attribute(AttributeDescription::required("title", AttributeType::Text))
            .with_attribute(AttributeDescription::optional("body", AttributeType::Text))
    }

    #[test]
    fn test_version_hash_ignores_attribute_order() {
        let reordered = EntityDescription::new("Note")
            .with_attribute(AttributeDescription::optional("body", AttributeType::Text))
            .with_attribute(AttributeDescription::required("title", AttributeType::Text));
        assert_eq!(note_entity().version_hash(), reordered.version_hash());
    }

    #[test]
    fn test_version_hash_changes_with_optionality() {
        let changed = EntityDescription::new("Note")
            .with_attribute(AttributeDescription::optional("title", AttributeType::Text))
            .with_attribute(AttributeDescription::optional("body", AttributeType::Text));
        assert_ne!(note_entity().version_hash(), changed.version_hash());
    }

    #[test]
    fn test_version_hash_modifier_forces_new_hash() {
        let mut modified = note_entity();
        modified.version_hash_modifier = Some("split-body".into());
        assert_ne!(note_entity().version_hash(), modified.version_hash());
    }

    #[test]
    fn test_compatibility_requires_exact_entity_set() {
        let model = SchemaModel::new("Notes").with_entity(note_entity());
        let wider = model.clone().with_entity(EntityDescription::new("Tag"));

        let metadata = StoreMetadata::for_model(&model, "sqlite", "s");
        assert!(model.is_compatible_with(&metadata));
        assert!(!wider.is_compatible_with(&metadata));
    }

    #[test]
    fn test_value_json_roundtrip_keeps_variants() {
        let record: Record = [
            ("flag".to_string(), Value::Boolean(true)),
            ("count".to_string(), Value::Integer(4)),
            ("ratio".to_string(), Value::Double(0.5)),
            ("name".to_string(), Value::Text("a".into())),
            ("none".to_string(), Value::Null),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_double_accepts_integer() {
        assert!(AttributeType::Double.accepts(&Value::Integer(1)));
        assert!(!AttributeType::Boolean.accepts(&Value::Integer(1)));
    }
}
