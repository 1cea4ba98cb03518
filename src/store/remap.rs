//! Legacy type remapping and type resolution.

use std::collections::{BTreeMap, BTreeSet};

use super::typed::{Persist, TypeName};

/// Maps legacy type identities to their current identities.
///
/// Consulted once per tagged object during load, before the identity is
/// resolved against the [`TypeRegistry`]. Lookups are single-hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: BTreeMap<TypeName, TypeName>,
}

impl RemapTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping, replacing any earlier mapping for `legacy`.
    pub fn insert(&mut self, legacy: TypeName, current: TypeName) {
        self.entries.insert(legacy, current);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, legacy: TypeName, current: TypeName) -> Self {
        self.insert(legacy, current);
        self
    }

    /// Map each of `names` from `legacy_namespace` to `current_namespace`,
    /// keeping the type name.
    pub fn with_moved_namespace(mut self, legacy_namespace: &str, current_namespace: &str, names: &[&str]) -> Self {
        for name in names {
            self.insert(
                TypeName::new(legacy_namespace, *name),
                TypeName::new(current_namespace, *name),
            );
        }
        self
    }

    /// Current identity for `declared`, if it is a known legacy identity.
    pub fn resolve(&self, declared: &TypeName) -> Option<&TypeName> {
        self.entries.get(declared)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no mappings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Set of type identities the loader is able to instantiate.
///
/// An empty registry accepts every identity; tagged objects are then
/// checked only by the target type when the root is deserialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    known: BTreeSet<TypeName>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the current identity of `T`.
    pub fn register<T: Persist>(mut self) -> Self {
        self.known.insert(T::type_name());
        self
    }

    /// Register an identity directly.
    pub fn insert(&mut self, type_name: TypeName) {
        self.known.insert(type_name);
    }

    /// Check if `type_name` can be resolved.
    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.known.contains(type_name)
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Check if no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
