//! Annotations and observable constructors.
//!
//! An [`Annotation`] says how one field of an observable object behaves:
//! deep-wrapped, shallow-wrapped, passed through by reference, boxed, or
//! derived. The constructor functions here resolve annotations once, at
//! wrap time; reads and writes consult the resolved result, never the
//! annotation table of the caller.

use std::collections::HashMap;
use std::sync::Arc;

use super::node::{raw_value, Mode, ObservableValue};
use crate::value::Value;

/// How a field (or a whole container) participates in tracking.
#[derive(Clone)]
pub enum Annotation {
    /// Track the field and recursively wrap containers stored in it.
    Deep,
    /// Track the field; containers stored in it wrap one level only.
    Shallow,
    /// Track nothing below the field: reassignment notifies, the stored
    /// value is returned as-is.
    Ref,
    /// Store the field behind a single observable slot.
    Boxed,
    /// Replace the field with a lazily-evaluated, cached derivation over
    /// the host object.
    Computed(Arc<dyn Fn(&ObservableValue) -> Value + Send + Sync>),
}

impl Annotation {
    /// Shorthand for [`Annotation::Computed`] without spelling the `Arc`.
    pub fn computed<F>(derive: F) -> Self
    where
        F: Fn(&ObservableValue) -> Value + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(derive))
    }
}

impl std::fmt::Debug for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deep => f.write_str("Deep"),
            Self::Shallow => f.write_str("Shallow"),
            Self::Ref => f.write_str("Ref"),
            Self::Boxed => f.write_str("Boxed"),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Wrap a value for deep observation.
///
/// Containers become observable nodes whose nested containers wrap
/// lazily on read. Scalars cannot carry interception and are returned
/// unchanged; this downgrade is logged rather than treated as an error.
/// Wrapping an already-observable value returns the same node.
pub fn observable(value: Value) -> Value {
    wrap(value, Mode::Deep)
}

/// Wrap a value for shallow observation: the top-level container is
/// tracked, nested containers are returned raw.
pub fn observable_shallow(value: Value) -> Value {
    wrap(value, Mode::Shallow)
}

fn wrap(value: Value, mode: Mode) -> Value {
    if value.is_container() {
        Value::Observable(ObservableValue::from_container(value, mode))
    } else {
        tracing::debug!(?value, "scalar cannot be made observable; returning it raw");
        value
    }
}

/// Put any value behind a single tracked slot, read and written through
/// [`ObservableValue::get_boxed`] / [`ObservableValue::set_boxed`].
pub fn observable_box(value: Value) -> ObservableValue {
    ObservableValue::new_box(value, Mode::Deep)
}

/// A box that tracks reassignment only: the stored value reads back
/// as-is, never wrapped.
pub fn observable_ref(value: Value) -> ObservableValue {
    ObservableValue::new_box(value, Mode::Shallow)
}

/// Wrap an object with per-field annotations.
///
/// Fields without an annotation behave deep. `Computed` annotations
/// install derived members read through `get(name)`; any stored data
/// under the same name is shadowed by the member. Non-object values fall
/// back to [`observable`], since only objects have named fields to
/// annotate.
pub fn make_observable<K, I>(value: Value, annotations: I) -> Value
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Annotation)>,
{
    if !matches!(value, Value::Object(_)) {
        tracing::debug!("field annotations apply to objects; wrapping deep instead");
        return observable(value);
    }
    let wrapped = ObservableValue::from_container(value, Mode::Deep);
    let mut overrides = HashMap::new();
    for (name, annotation) in annotations {
        let name = name.into();
        match annotation {
            Annotation::Computed(derive) => wrapped.define_computed(&name, derive),
            other => {
                overrides.insert(name, other);
            }
        }
    }
    wrapped.set_overrides(overrides);
    Value::Observable(wrapped)
}

/// Whether a value is an observable handle.
pub fn is_observable(value: &Value) -> bool {
    value.is_observable()
}

/// Untracked deep snapshot: plain data with every observable unwrapped.
pub fn to_raw(value: &Value) -> Value {
    raw_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::autorun;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc as StdArc;

    fn as_node(value: Value) -> ObservableValue {
        match value {
            Value::Observable(o) => o,
            other => panic!("expected observable, got {other:?}"),
        }
    }

    #[test]
    fn scalars_pass_through_unwrapped() {
        let v = observable(Value::from(42i64));
        assert!(!is_observable(&v));
        assert_eq!(v.as_i64(), Some(42));
    }

    #[test]
    fn shallow_leaves_children_raw() {
        let o = as_node(observable_shallow(Value::from(json!({"inner": {"x": 1}}))));
        assert!(matches!(o.get("inner"), Value::Object(_)));
    }

    #[test]
    fn ref_box_tracks_reassignment_only() {
        let slot = observable_ref(Value::from(json!({"x": 1})));
        // Contents are never wrapped.
        assert!(matches!(slot.get_boxed(), Value::Object(_)));

        let swaps = StdArc::new(AtomicI32::new(0));
        let seen = swaps.clone();
        let slot_reader = slot.clone();
        let _d = autorun(move || {
            let _ = slot_reader.get_boxed();
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(swaps.load(Ordering::SeqCst), 1);
        slot.set_boxed(Value::from(json!({"x": 2})));
        assert_eq!(swaps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shallow_override_inside_deep_object() {
        let o = as_node(make_observable(
            Value::from(json!({"deep": {"a": {}}, "flat": {"b": {}}})),
            [("flat", Annotation::Shallow)],
        ));
        let deep_child = as_node(o.get("deep"));
        assert!(matches!(deep_child.get("a"), Value::Observable(_)));
        let flat_child = as_node(o.get("flat"));
        assert!(matches!(flat_child.get("b"), Value::Object(_)));
    }

    #[test]
    fn ref_override_passes_container_through() {
        let o = as_node(make_observable(
            Value::from(json!({"r": {"x": 1}})),
            [("r", Annotation::Ref)],
        ));
        assert!(matches!(o.get("r"), Value::Object(_)));
        // The field itself still notifies on reassignment.
        let before = o.revision();
        o.set("r", Value::from(json!({"x": 2})));
        assert_eq!(o.revision(), before + 1);
    }

    #[test]
    fn computed_member_derives_and_invalidates() {
        let o = as_node(make_observable(
            Value::from(json!({"a": 2, "b": 3})),
            [(
                "product",
                Annotation::computed(|host| {
                    let a = host.get("a").as_i64().unwrap_or(0);
                    let b = host.get("b").as_i64().unwrap_or(0);
                    Value::from(a * b)
                }),
            )],
        ));
        assert_eq!(o.get("product").as_i64(), Some(6));
        assert!(o.has("product"));

        o.set("a", 5i64);
        assert_eq!(o.get("product").as_i64(), Some(15));

        // An untouched input keeps the cache valid through reads.
        assert_eq!(o.get("product").as_i64(), Some(15));
    }

    #[test]
    fn computed_member_shadows_stored_field() {
        let o = as_node(make_observable(
            Value::from(json!({"x": 1})),
            [("x", Annotation::computed(|_| Value::from(99i64)))],
        ));
        assert_eq!(o.get("x").as_i64(), Some(99));
    }

    #[test]
    fn to_raw_strips_all_wrapping() {
        let wrapped = observable(Value::from(json!({"a": [1, {"b": 2}]})));
        let o = as_node(wrapped.clone());
        let _ = as_node(o.get("a")).get_index(1);
        let raw = to_raw(&wrapped);
        assert!(!is_observable(&raw));
        assert_eq!(raw, Value::from(json!({"a": [1, {"b": 2}]})));
    }

    #[test]
    fn annotations_on_non_object_fall_back_to_deep() {
        let v = make_observable(
            Value::from(json!([1, 2])),
            [("unused", Annotation::Shallow)],
        );
        assert!(is_observable(&v));
    }
}
