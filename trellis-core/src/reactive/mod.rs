//! Reactive Runtime
//!
//! This module implements the computation side of the engine: the tracking
//! context stack, the dependency registry, the batching scheduler, and the
//! two kinds of computation built on them.
//!
//! # Concepts
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazy cached derivation. Reading it inside another
//! computation records "this computed was read"; the nested reads it
//! performs belong to the computed itself. It recomputes only when read
//! while stale.
//!
//! ## Reactions
//!
//! A reaction ([`autorun`], [`reaction`]) is eager: it runs once at
//! creation and re-runs through the scheduler whenever a dependency
//! changes, at most once per flush pass.
//!
//! ## Batches
//!
//! [`batch`] coalesces any number of synchronous writes into a single
//! propagation pass. A bare write is an implicit batch of one.
//!
//! # Implementation Notes
//!
//! Dependency discovery is automatic: reads attribute themselves to the
//! computation on top of a thread-local tracking stack, and a
//! computation's dependency set is replaced wholesale after each
//! successful run. The engine is single-threaded cooperative; all
//! "concurrency" is synchronous re-entrancy, handled by the stack and the
//! scheduler's nesting counter.

mod autorun;
mod batch;
mod computed;
mod context;
mod runtime;
mod subscriber;

pub use autorun::{autorun, reaction, Disposer};
pub use batch::batch;
pub use computed::{computed, Computed};
pub use context::{untracked, TrackingFrame};
pub use runtime::{DepKey, Reactive, ReactiveHandle, Registry};
pub use subscriber::{NodeId, Phase, SubscriberId};

pub(crate) use batch::notify_write;
