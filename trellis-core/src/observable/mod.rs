//! The observable layer: interception and annotations.
//!
//! [`ObservableValue`] nodes intercept every read and write of a wrapped
//! container. Reads report `(node, key)` pairs to the tracking context;
//! writes notify the dependency registry. [`Annotation`]s decide, per
//! field, whether nested data wraps deep, shallow, by reference, boxed,
//! or as a derived member.

mod annotation;
mod key;
mod node;

pub use annotation::{
    is_observable, make_observable, observable, observable_box, observable_ref,
    observable_shallow, to_raw, Annotation,
};
pub use key::PropertyKey;
pub use node::{ObservableKind, ObservableValue};
