//! Computation identity and lifecycle state.
//!
//! A Subscriber is any computation with a tracked dependency set: a computed
//! value or a reaction. Observable sources (container nodes, boxed slots,
//! and computed values in their role as dependencies) carry a `NodeId`.
//! Computed values carry both: a `SubscriberId` for the edges they hold on
//! others, and a `NodeId` for the edges others hold on them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a computation (computed value or reaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for an observable source in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state of a computation.
///
/// ```text
/// Clean -> Stale -> Running -> Clean
///   \        \        /
///    `--------`------'-------> Disposed   (terminal, reachable from any state)
/// ```
///
/// For a computed value, `Stale` means the cache is invalid and the next
/// read recomputes; for a reaction it means a re-run is pending in the
/// scheduler. `Running` is what makes the cyclic-computed check possible:
/// reading a computed that is `Running` is a self-dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Cache valid (computed) or no pending re-run (reaction).
    Clean,
    /// A dependency changed since the last successful run.
    Stale,
    /// Currently executing inside the tracking context.
    Running,
    /// Explicitly disposed. Terminal.
    Disposed,
}
