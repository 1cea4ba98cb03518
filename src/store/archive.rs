//! Archive envelope and type resolution for persisted state.

use chrono::{DateTime, Utc};
use ciborium::Value;
use serde::{Deserialize, Serialize};

use super::remap::{RemapTable, TypeRegistry};
use super::typed::{TypeName, TYPE_KEY};
use super::StoreError;

/// Format marker written into every archive.
pub const ARCHIVE_FORMAT: &str = "zpi";

/// Envelope version written by this crate.
pub const ARCHIVE_VERSION: u32 = 1;

/// Envelope written on save, borrowing the value being persisted.
#[derive(Serialize)]
pub(crate) struct EnvelopeRef<'a, T: ?Sized> {
    format: &'static str,
    version: u32,
    saved_at: DateTime<Utc>,
    root: &'a T,
}

impl<'a, T: ?Sized> EnvelopeRef<'a, T> {
    pub(crate) fn new(root: &'a T) -> Self {
        Self {
            format: ARCHIVE_FORMAT,
            version: ARCHIVE_VERSION,
            saved_at: Utc::now(),
            root,
        }
    }
}

/// Envelope read on load, before the root is resolved and deserialized.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub format: String,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub root: Value,
}

impl Envelope {
    /// Reject archives written in another format or a newer version.
    pub(crate) fn check(&self, origin: &str) -> Result<(), StoreError> {
        if self.format != ARCHIVE_FORMAT {
            return Err(StoreError::corrupt(
                origin,
                format!("unexpected archive format {:?}", self.format),
            ));
        }
        if self.version == 0 || self.version > ARCHIVE_VERSION {
            return Err(StoreError::corrupt(
                origin,
                format!("unsupported archive version {}", self.version),
            ));
        }
        Ok(())
    }
}

/// Walks an object graph, remapping and resolving every `$type` tag.
///
/// With an empty registry every identity is accepted after remapping and
/// the target type's `Deserialize` impl decides whether it matches.
pub(crate) struct TypeResolver<'a> {
    remap: &'a RemapTable,
    registry: &'a TypeRegistry,
    origin: &'a str,
    /// Number of tags rewritten from a legacy identity.
    pub remapped: usize,
}

impl<'a> TypeResolver<'a> {
    pub(crate) fn new(remap: &'a RemapTable, registry: &'a TypeRegistry, origin: &'a str) -> Self {
        Self {
            remap,
            registry,
            origin,
            remapped: 0,
        }
    }

    /// Resolve every tagged object in `value`, rewriting legacy tags in place.
    pub(crate) fn resolve(&mut self, value: &mut Value) -> Result<(), StoreError> {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.resolve(item)?;
                }
            }
            Value::Map(entries) => {
                for (key, child) in entries.iter_mut() {
                    if is_type_key(key) {
                        self.resolve_tag(child)?;
                    } else {
                        self.resolve(child)?;
                    }
                }
            }
            Value::Tag(_, inner) => self.resolve(inner)?,
            _ => {}
        }
        Ok(())
    }

    fn resolve_tag(&mut self, tag: &mut Value) -> Result<(), StoreError> {
        let declared: TypeName = tag
            .deserialized()
            .map_err(|e| StoreError::corrupt(self.origin, format!("malformed type tag: {e}")))?;

        let current = match self.remap.resolve(&declared) {
            Some(current) => {
                tracing::debug!(from = %declared, to = %current, "Remapped legacy type");
                self.remapped += 1;
                current.clone()
            }
            None => declared,
        };

        if !self.registry.is_empty() && !self.registry.contains(&current) {
            return Err(StoreError::UnknownType(current));
        }

        *tag = type_name_value(current);
        Ok(())
    }
}

fn is_type_key(key: &Value) -> bool {
    matches!(key, Value::Text(text) if text == TYPE_KEY)
}

fn type_name_value(type_name: TypeName) -> Value {
    Value::Map(vec![
        (Value::Text("namespace".to_string()), Value::Text(type_name.namespace)),
        (Value::Text("name".to_string()), Value::Text(type_name.name)),
    ])
}
