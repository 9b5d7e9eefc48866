//! Error taxonomy for the reactivity engine.
//!
//! The engine distinguishes fail-fast errors from documented no-ops:
//!
//! - Cyclic computed evaluation fails fast (this module).
//! - Operating on a disposed computation is an idempotent no-op.
//! - Annotating a non-container as deep/shallow downgrades to pass-through
//!   (logged at debug level, never raised).
//!
//! Errors raised inside user-supplied derivation or reaction bodies are not
//! caught by the engine; they unwind to the caller of the triggering read or
//! write while the tracking stack restores itself through drop guards.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Errors surfaced by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A computed value read its own value, directly or transitively, while
    /// it was being evaluated. Returning a cached or partial value here
    /// would hide the cycle, so the read fails instead.
    #[error("cyclic computed evaluation: computation {0:?} read its own value while computing")]
    CyclicComputation(SubscriberId),
}
