//! Type identities for tagged objects inside persisted state.
//!
//! A value wrapped in [`Typed`] is written as the map
//!
//! ```text
//! {"$type": {"namespace": "...", "name": "..."}, "$data": <value>}
//! ```
//!
//! so that the loader can see which type an archive declared and remap
//! identities that have since moved.

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Key holding the declared type identity of a tagged object.
pub const TYPE_KEY: &str = "$type";

/// Key holding the payload of a tagged object.
pub const DATA_KEY: &str = "$data";

/// `(namespace, name)` identity of a persisted type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeName {
    /// Namespace the type lives in (module path, package, ...).
    pub namespace: String,
    /// Type name within the namespace.
    pub name: String,
}

impl TypeName {
    /// Create a new type identity.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// A type that is written to archives under a stable identity.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use workload_kernel::store::Persist;
///
/// #[derive(Serialize, Deserialize)]
/// struct Axis {
///     label: String,
///     values: Vec<f64>,
/// }
///
/// impl Persist for Axis {
///     const NAMESPACE: &'static str = "geometry.space";
///     const TYPE_NAME: &'static str = "Axis";
/// }
///
/// assert_eq!(Axis::type_name().to_string(), "geometry.space.Axis");
/// ```
pub trait Persist: Serialize + DeserializeOwned {
    /// Namespace of the current identity.
    const NAMESPACE: &'static str;
    /// Name of the current identity.
    const TYPE_NAME: &'static str;

    /// Current identity of this type.
    fn type_name() -> TypeName {
        TypeName::new(Self::NAMESPACE, Self::TYPE_NAME)
    }
}

/// Wrapper that writes a [`Persist`] value together with its type identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Typed<T>(pub T);

impl<T> Typed<T> {
    /// Unwrap the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Typed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Typed<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for Typed<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T: Persist> Serialize for Typed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Typed", 2)?;
        state.serialize_field(TYPE_KEY, &T::type_name())?;
        state.serialize_field(DATA_KEY, &self.0)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawTyped {
    #[serde(rename = "$type")]
    type_name: TypeName,
    #[serde(rename = "$data")]
    data: ciborium::Value,
}

impl<'de, T: Persist> Deserialize<'de> for Typed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawTyped::deserialize(deserializer)?;
        let expected = T::type_name();
        if raw.type_name != expected {
            return Err(D::Error::custom(format!(
                "expected object of type {expected}, found {}",
                raw.type_name
            )));
        }
        raw.data.deserialized::<T>().map(Typed).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Axis {
        label: String,
    }

    impl Persist for Axis {
        const NAMESPACE: &'static str = "geometry";
        const TYPE_NAME: &'static str = "Axis";
    }

    #[test]
    fn test_typed_wire_shape() {
        let value = serde_json::to_value(Typed(Axis { label: "x".into() })).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "$type": {"namespace": "geometry", "name": "Axis"},
                "$data": {"label": "x"},
            })
        );
    }

    #[test]
    fn test_typed_rejects_other_identity() {
        let value = serde_json::json!({
            "$type": {"namespace": "other", "name": "Axis"},
            "$data": {"label": "x"},
        });
        let err = serde_json::from_value::<Typed<Axis>>(value).unwrap_err();
        assert!(err.to_string().contains("other.Axis"));
    }
}
