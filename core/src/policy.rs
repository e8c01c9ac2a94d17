//! Custom per-entity migration hooks.
//!
//! An explicit mapping may name an [`EntityMigrationPolicy`] for an entity
//! whose records cannot be converted declaratively. Policies are registered
//! in a [`PolicyRegistry`] under their namespace-qualified name, which is
//! the form [`MappingModel::qualify_policies`](crate::MappingModel::qualify_policies)
//! rewrites mapping references into.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::{EntityDescription, EntityMapping, Record, sanitize_namespace};

/// Error raised by a custom policy. Fails the whole migration step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    /// Creates a policy error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a policy sees besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Entity mapping being applied.
    pub mapping: &'a EntityMapping,
    /// Entity the produced record is stored as.
    pub destination: &'a EntityDescription,
}

/// Custom conversion hook for one entity mapping.
///
/// # Examples
///
/// ```
/// use store_ladder_core::*;
///
/// struct Uppercase;
///
/// impl EntityMigrationPolicy for Uppercase {
///     fn create_destination(
///         &self,
///         _ctx: &PolicyContext<'_>,
///         _source: &Record,
///         mut destination: Record,
///     ) -> Result<Option<Record>, PolicyError> {
///         if let Some(Value::Text(title)) = destination.get_mut("title") {
///             *title = title.to_uppercase();
///         }
///         Ok(Some(destination))
///     }
/// }
///
/// let mut registry = PolicyRegistry::new();
/// let name = registry.register_in("notes-app", "Uppercase", Uppercase);
/// assert_eq!(name, "notes_app.Uppercase");
/// assert!(registry.get("notes_app.Uppercase").is_some());
/// ```
pub trait EntityMigrationPolicy: Send + Sync {
    /// Produces the destination record for one source record.
    ///
    /// `destination` already holds the declaratively mapped values. Return
    /// `Ok(None)` to drop the record, or an error to fail the step.
    fn create_destination(
        &self,
        ctx: &PolicyContext<'_>,
        source: &Record,
        destination: Record,
    ) -> Result<Option<Record>, PolicyError>;
}

/// Fully qualified policy name to policy.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<dyn EntityMigrationPolicy>>,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `policy` under an already qualified `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        policy: impl EntityMigrationPolicy + 'static,
    ) {
        self.policies.insert(name.into(), Arc::new(policy));
    }

    /// Registers `policy` as `<sanitized namespace>.<name>` and returns that name.
    pub fn register_in(
        &mut self,
        namespace: &str,
        name: &str,
        policy: impl EntityMigrationPolicy + 'static,
    ) -> String {
        let qualified = format!("{}.{name}", sanitize_namespace(namespace));
        self.register(qualified.clone(), policy);
        qualified
    }

    /// Looks up a policy by qualified name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn EntityMigrationPolicy>> {
        self.policies.get(name).cloned()
    }

    /// Returns `true` if a policy is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.policies.keys().collect();
        names.sort();
        f.debug_struct("PolicyRegistry")
            .field("policies", &names)
            .finish()
    }
}
