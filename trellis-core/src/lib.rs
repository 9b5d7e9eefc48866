//! Trellis Core
//!
//! This crate provides the core engine for the Trellis reactive state
//! framework. It implements:
//!
//! - Observable containers with intercepted reads and writes
//! - Automatic dependency tracking (readers subscribe by reading)
//! - Lazily cached computed values
//! - Eager reactions (autorun) driven by batched propagation
//! - Per-field annotations (deep, shallow, ref, boxed, computed)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The plain data model (`Scalar`, `Value`) observables wrap
//! - `observable`: Observable nodes, property keys, and annotations
//! - `reactive`: Tracking context, dependency registry, scheduler,
//!   computed values, and reactions
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{autorun, computed, observable, Value};
//! use serde_json::json;
//!
//! // Wrap plain data
//! let state = observable(Value::from(json!({"count": 0})));
//! let state = state.as_observable().unwrap().clone();
//!
//! // Derive a value; it recomputes only when `count` changes
//! let reader = state.clone();
//! let doubled = computed(move || reader.get("count").as_i64().unwrap_or(0) * 2);
//!
//! // React eagerly; runs once now, again after each relevant write
//! let watched = doubled.clone();
//! let _disposer = autorun(move || {
//!     let _ = watched.get();
//! });
//!
//! state.set("count", 5i64);
//! assert_eq!(doubled.get(), 10);
//! ```

pub mod error;
pub mod observable;
pub mod reactive;
pub mod value;

pub use error::ReactiveError;
pub use observable::{
    is_observable, make_observable, observable, observable_box, observable_ref,
    observable_shallow, to_raw, Annotation, ObservableKind, ObservableValue, PropertyKey,
};
pub use reactive::{autorun, batch, computed, reaction, untracked, Computed, Disposer};
pub use value::{Scalar, Value};
