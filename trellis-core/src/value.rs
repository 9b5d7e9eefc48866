//! Dynamic Value Model
//!
//! Observables wrap plain data: objects, arrays, maps, sets, and scalars.
//! `Value` is the owned, dynamically-typed tree those containers hold, and
//! the currency of the accessor surface (`get` returns a `Value`, `set`
//! takes one).
//!
//! # Equality
//!
//! Two notions of equality live here and must not be conflated:
//!
//! - `PartialEq` is structural, for callers comparing snapshots and for
//!   change detection in `Computed<T>`. Observable handles compare by
//!   pointer identity, floats by bit pattern (NaN equals itself).
//!
//! - [`Value::shallow_eq`] is the write-path check: scalars by value,
//!   observables by pointer identity, and any raw container is always
//!   considered a change. This mirrors reference equality in the source
//!   semantics and is an intentional predictability/performance trade-off;
//!   deep equality is deliberately not used on writes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::observable::ObservableValue;

/// A non-container value: the leaves of the data tree.
///
/// Scalars double as map keys and set members, which is why `Eq` and `Hash`
/// are implemented by hand (floats hash and compare by bit pattern).
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(n) => Some(*n as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render this scalar as an object property name.
    ///
    /// Object keys are strings; non-string scalars used as object keys are
    /// coerced to their display form, matching the source language where
    /// `o[1]` and `o["1"]` address the same slot.
    pub fn to_key_string(&self) -> String {
        match self {
            Scalar::Str(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            // Bit equality: NaN is equal to itself, as in `Object.is`.
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Scalar::Null => 0u8.hash(state),
            Scalar::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Scalar::Int(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            Scalar::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Scalar::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Int(n as i64)
    }
}

impl From<usize> for Scalar {
    fn from(n: usize) -> Self {
        Scalar::Int(n as i64)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(Arc::from(s))
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(Arc::from(s.as_str()))
    }
}

/// An owned, dynamically-typed value.
///
/// The `Observable` variant is how a wrapped container flows through slots
/// and return values; everything else is plain data. Objects and maps keep
/// insertion order (the source language's object-key ordering).
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Map(IndexMap<Scalar, Value>),
    Set(IndexSet<Scalar>),
    Observable(ObservableValue),
}

impl Value {
    pub const fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    /// Whether this value is a raw container (object, array, map, or set).
    ///
    /// Already-wrapped observables are not "raw" containers; wrapping them
    /// again returns the existing node.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Map(_) | Value::Set(_)
        )
    }

    pub fn is_observable(&self) -> bool {
        matches!(self, Value::Observable(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Scalar::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_observable(&self) -> Option<&ObservableValue> {
        match self {
            Value::Observable(o) => Some(o),
            _ => None,
        }
    }

    /// The write-path equality check.
    ///
    /// Scalars compare by value, observables by pointer identity, and any
    /// other combination is a change. A freshly-built raw container never
    /// equals the value it replaces, exactly as a new object literal never
    /// reference-equals the old one.
    pub fn shallow_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Observable(a), Value::Observable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Observable(a), Value::Observable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Scalar(Scalar::Int(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Scalar(Scalar::Int(n as i64))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Scalar(Scalar::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::Object(fields)
    }
}

impl From<ObservableValue> for Value {
    fn from(o: ObservableValue) -> Self {
        Value::Observable(o)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::null(),
            serde_json::Value::Bool(b) => Value::from(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else {
                    Value::from(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(n) => serializer.serialize_i64(*n),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_key_string(), value)?;
                }
                map.end()
            }
            Value::Set(members) => {
                let mut seq = serializer.serialize_seq(Some(members.len()))?;
                for member in members {
                    seq.serialize_element(member)?;
                }
                seq.end()
            }
            // Observables serialize as their untracked raw snapshot.
            Value::Observable(o) => o.raw().serialize(serializer),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_float_equality_uses_bits() {
        assert_eq!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
        assert_ne!(Scalar::Float(0.0), Scalar::Float(-0.0));
        assert_eq!(Scalar::Float(1.5), Scalar::Float(1.5));
    }

    #[test]
    fn scalar_key_coercion() {
        assert_eq!(Scalar::Int(1).to_key_string(), "1");
        assert_eq!(Scalar::from("name").to_key_string(), "name");
        assert_eq!(Scalar::Bool(true).to_key_string(), "true");
    }

    #[test]
    fn shallow_eq_scalars_by_value() {
        assert!(Value::from(3i64).shallow_eq(&Value::from(3i64)));
        assert!(!Value::from(3i64).shallow_eq(&Value::from(4i64)));
        assert!(Value::null().shallow_eq(&Value::null()));
    }

    #[test]
    fn shallow_eq_raw_containers_always_differ() {
        let a = Value::from(json!({"x": 1}));
        let b = Value::from(json!({"x": 1}));
        // Structurally equal, but a fresh container is always a change.
        assert_eq!(a, b);
        assert!(!a.shallow_eq(&b));
    }

    #[test]
    fn from_json_preserves_shape() {
        let v = Value::from(json!({"a": 1, "b": [true, null], "c": 2.5}));
        let Value::Object(fields) = &v else {
            panic!("expected object")
        };
        assert_eq!(fields["a"], Value::from(1i64));
        assert_eq!(
            fields["b"],
            Value::Array(vec![Value::from(true), Value::null()])
        );
        assert_eq!(fields["c"], Value::from(2.5));
    }

    #[test]
    fn serialize_round_trip() {
        let v = Value::from(json!({"a": 1, "b": ["x", false]}));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, json!({"a": 1, "b": ["x", false]}));
    }

    #[test]
    fn set_serializes_as_sequence() {
        let mut members = IndexSet::new();
        members.insert(Scalar::from("a"));
        members.insert(Scalar::from("b"));
        let json = serde_json::to_value(Value::Set(members)).unwrap();
        assert_eq!(json, json!(["a", "b"]));
    }
}
