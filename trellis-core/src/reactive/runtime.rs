//! Dependency Registry
//!
//! The registry is the one process-wide mutable structure in the engine: a
//! bidirectional index between observable property locations and the
//! computations that read them.
//!
//! # How It Works
//!
//! 1. Computations register themselves on creation and are held only as
//!    weak references, so a dropped computation can never be retained by
//!    the data it observed.
//!
//! 2. After a computation's run succeeds, its entire edge set is replaced
//!    with the reads collected during that run. Dependencies can change
//!    run to run (conditional reads), so old edges never linger.
//!
//! 3. A write asks for the dependents of the touched `(node, key)` pairs;
//!    the answer is deduplicated and in registration order, which is the
//!    order reactions flush in when nothing else orders them.
//!
//! All registry mutation happens on the single logical thread that runs
//! computations; the locks only make the shared statics sound.

use std::collections::{HashMap, HashSet};
use std::sync::{OnceLock, Weak};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::subscriber::{NodeId, SubscriberId};
use crate::observable::PropertyKey;

/// A dependency location: one addressable slot of one observable source.
pub type DepKey = (NodeId, PropertyKey);

/// A computation the registry can mark stale and (for reactions) re-run.
pub trait Reactive: Send + Sync {
    /// This computation's identity in the registry.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark stale. Returns `true` only on a fresh transition, so multiple
    /// writes within a batch coalesce at the marking step.
    fn mark_stale(&self) -> bool;

    /// Eager computations (reactions) are executed by the flush; lazy ones
    /// (computed values) recompute on their next read instead.
    fn is_eager(&self) -> bool;

    /// Re-run the computation if it is still stale. No-op for lazy ones.
    fn run(&self);

    /// Whether the computation has been disposed.
    fn is_disposed(&self) -> bool;

    /// For computed values: the `NodeId` under which their own readers
    /// registered, so staleness can cascade through them. `None` for
    /// reactions.
    fn source_id(&self) -> Option<NodeId>;
}

/// Handle to a registered computation.
///
/// Dropping the handle unregisters the computation and prunes its edges.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Registry::unregister(self.subscriber_id);
    }
}

/// The global dependency registry.
pub struct Registry;

struct EdgeIndex {
    /// Forward: dependency location -> computations that read it, in
    /// registration order.
    dependents: HashMap<DepKey, IndexSet<SubscriberId>>,
    /// Reverse: computation -> locations it reads, for O(edges) replacement
    /// and pruning.
    reads: HashMap<SubscriberId, HashSet<DepKey>>,
}

static SUBSCRIBERS: OnceLock<RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>>> = OnceLock::new();
static EDGES: OnceLock<RwLock<EdgeIndex>> = OnceLock::new();

fn subscribers() -> &'static RwLock<HashMap<SubscriberId, Weak<dyn Reactive>>> {
    SUBSCRIBERS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn edges() -> &'static RwLock<EdgeIndex> {
    EDGES.get_or_init(|| {
        RwLock::new(EdgeIndex {
            dependents: HashMap::new(),
            reads: HashMap::new(),
        })
    })
}

impl Registry {
    /// Register a computation. Returns a handle that unregisters it when
    /// dropped.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        subscribers().write().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        subscribers().write().remove(&id);
        Self::clear_edges(id);
    }

    /// Look up a live computation by ID.
    pub fn get(id: SubscriberId) -> Option<Arc<dyn Reactive>> {
        subscribers().read().get(&id).and_then(Weak::upgrade)
    }

    /// Replace a computation's dependency set with the reads from its most
    /// recent successful run.
    pub fn replace_edges(id: SubscriberId, new_reads: Vec<DepKey>) {
        let mut index = edges().write();
        if let Some(old) = index.reads.remove(&id) {
            for dep in &old {
                let now_empty = index.dependents.get_mut(dep).is_some_and(|subs| {
                    subs.shift_remove(&id);
                    subs.is_empty()
                });
                if now_empty {
                    index.dependents.remove(dep);
                }
            }
        }
        let mut set = HashSet::with_capacity(new_reads.len());
        for dep in new_reads {
            if set.insert(dep.clone()) {
                index.dependents.entry(dep).or_default().insert(id);
            }
        }
        if !set.is_empty() {
            index.reads.insert(id, set);
        }
    }

    /// Remove every edge held by a computation (disposal path).
    pub fn clear_edges(id: SubscriberId) {
        Self::replace_edges(id, Vec::new());
    }

    /// Distinct dependents of the given locations, in registration order.
    pub fn dependents_of(node: NodeId, keys: &[PropertyKey]) -> Vec<SubscriberId> {
        let index = edges().read();
        let mut out: IndexSet<SubscriberId> = IndexSet::new();
        for key in keys {
            if let Some(subs) = index.dependents.get(&(node, key.clone())) {
                out.extend(subs.iter().copied());
            }
        }
        out.into_iter().collect()
    }

    /// Number of edges currently held by a computation.
    pub fn edge_count(id: SubscriberId) -> usize {
        edges().read().reads.get(&id).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockReactive {
        id: SubscriberId,
        stale: AtomicBool,
        eager: bool,
    }

    impl MockReactive {
        fn new(eager: bool) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                stale: AtomicBool::new(false),
                eager,
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn mark_stale(&self) -> bool {
            !self.stale.swap(true, Ordering::SeqCst)
        }

        fn is_eager(&self) -> bool {
            self.eager
        }

        fn run(&self) {
            self.stale.store(false, Ordering::SeqCst);
        }

        fn is_disposed(&self) -> bool {
            false
        }

        fn source_id(&self) -> Option<NodeId> {
            None
        }
    }

    #[test]
    fn registers_and_unregisters() {
        let reactive = MockReactive::new(false);
        let id = reactive.id;

        let handle = Registry::register(reactive);
        assert!(Registry::get(id).is_some());

        drop(handle);
        assert!(Registry::get(id).is_none());
    }

    #[test]
    fn replace_edges_drops_old_edges() {
        let reactive = MockReactive::new(true);
        let id = reactive.id;
        let _handle = Registry::register(reactive);

        let node = NodeId::new();
        Registry::replace_edges(
            id,
            vec![(node, PropertyKey::Index(0)), (node, PropertyKey::Index(1))],
        );
        assert_eq!(Registry::edge_count(id), 2);
        assert_eq!(
            Registry::dependents_of(node, &[PropertyKey::Index(0)]),
            vec![id]
        );

        // A re-run that only read index 1 must drop the index-0 edge.
        Registry::replace_edges(id, vec![(node, PropertyKey::Index(1))]);
        assert!(Registry::dependents_of(node, &[PropertyKey::Index(0)]).is_empty());
        assert_eq!(
            Registry::dependents_of(node, &[PropertyKey::Index(1)]),
            vec![id]
        );
    }

    #[test]
    fn dependents_are_deduplicated_and_ordered() {
        let first = MockReactive::new(true);
        let second = MockReactive::new(true);
        let first_id = first.id;
        let second_id = second.id;
        let _h1 = Registry::register(first);
        let _h2 = Registry::register(second);

        let node = NodeId::new();
        Registry::replace_edges(
            first_id,
            vec![(node, PropertyKey::Index(0)), (node, PropertyKey::Iteration)],
        );
        Registry::replace_edges(second_id, vec![(node, PropertyKey::Index(0))]);

        // Both keys hit `first`; it must appear once, before `second`.
        let subs =
            Registry::dependents_of(node, &[PropertyKey::Index(0), PropertyKey::Iteration]);
        assert_eq!(subs, vec![first_id, second_id]);
    }

    #[test]
    fn unregister_prunes_edges() {
        let reactive = MockReactive::new(true);
        let id = reactive.id;
        let handle = Registry::register(reactive);

        let node = NodeId::new();
        Registry::replace_edges(id, vec![(node, PropertyKey::Iteration)]);
        assert_eq!(
            Registry::dependents_of(node, &[PropertyKey::Iteration]),
            vec![id]
        );

        drop(handle);
        assert!(Registry::dependents_of(node, &[PropertyKey::Iteration]).is_empty());
        assert_eq!(Registry::edge_count(id), 0);
    }
}
