//! Property keys: the addressable slots of an observable source.

use crate::value::Scalar;

/// Identifies one addressable slot inside an observable source.
///
/// `Iteration` is the collection-level sentinel: enumeration-class reads
/// (`len`, `keys`, full iteration) track it, and any write that changes
/// membership or size notifies it. That is what lets "push an element"
/// invalidate a reaction that iterated the array even though no
/// previously-read index changed.
///
/// `Slot` is the whole-value key of single-slot sources: boxed primitives
/// and computed values in their role as dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// An object or map entry. Object keys are `Scalar::Str`.
    Entry(Scalar),
    /// An array index.
    Index(usize),
    /// Collection-level sentinel for size/iteration.
    Iteration,
    /// The single slot of a boxed primitive or a computed value.
    Slot,
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKey::Entry(key) => write!(f, "{key}"),
            PropertyKey::Index(i) => write!(f, "[{i}]"),
            PropertyKey::Iteration => write!(f, "<iteration>"),
            PropertyKey::Slot => write!(f, "<slot>"),
        }
    }
}
