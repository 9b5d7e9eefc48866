//! Batching Scheduler
//!
//! Coalesces synchronous mutations into one propagation pass. Entering a
//! batch scope increments a nesting counter; only when the outermost scope
//! exits does the scheduler flush, running each pending reaction at most
//! once per flush pass. A bare write (no open batch) behaves as an
//! implicit batch of one.
//!
//! # Propagation
//!
//! A write hands the distinct dependents of the touched locations to
//! [`notify_write`]. Each dependent is marked stale exactly once per
//! transition: eager reactions join the ordered pending set, lazy computed
//! values cascade staleness to *their* readers through the registry and
//! recompute on next read (pull semantics).
//!
//! # Re-entrancy
//!
//! Writes performed by a running reaction append to the pending set. A
//! reaction that already ran in the current pass is not re-entered; it runs
//! again in a follow-up pass. Passes are capped so a non-converging
//! reaction set degrades into a logged error instead of a hang.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::runtime::Registry;
use super::subscriber::{NodeId, SubscriberId};
use crate::observable::PropertyKey;

/// A reaction set that needs more passes than this is not converging.
const MAX_FLUSH_PASSES: usize = 100;

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState {
        depth: 0,
        flushing: false,
        pending: IndexSet::new(),
    });
}

struct SchedulerState {
    /// Batch nesting counter.
    depth: usize,
    /// Whether a flush is draining the pending set right now.
    flushing: bool,
    /// Stale reactions awaiting execution, deduplicated, in the order they
    /// were first marked stale.
    pending: IndexSet<SubscriberId>,
}

/// Run `f` inside a batch scope, coalescing all writes it performs.
///
/// Nesting is legal; the flush happens when the outermost scope exits.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _guard = BatchGuard::enter();
    f()
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        SCHEDULER.with(|s| s.borrow_mut().depth += 1);
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let should_flush = SCHEDULER.with(|s| {
            let mut state = s.borrow_mut();
            state.depth -= 1;
            state.depth == 0 && !state.flushing && !state.pending.is_empty()
        });
        // If the batch body panicked, leave the pending set for the next
        // flush instead of running reactions during unwinding.
        if should_flush && !std::thread::panicking() {
            flush();
        }
    }
}

/// Propagate a write to the dependents of `(source, keys)`.
///
/// Called by observable nodes after they have released their own locks, so
/// reactions running in an implicit flush can freely read the node again.
pub(crate) fn notify_write(source: NodeId, keys: &[PropertyKey]) {
    let dependents = Registry::dependents_of(source, keys);
    if dependents.is_empty() {
        return;
    }
    schedule_stale(&dependents);
    let should_flush = SCHEDULER.with(|s| {
        let state = s.borrow();
        state.depth == 0 && !state.flushing && !state.pending.is_empty()
    });
    if should_flush {
        flush();
    }
}

/// Mark each dependent stale once; enqueue eager ones, cascade through
/// lazy ones.
fn schedule_stale(dependents: &[SubscriberId]) {
    for &id in dependents {
        let Some(reactive) = Registry::get(id) else {
            continue;
        };
        if reactive.is_disposed() || !reactive.mark_stale() {
            continue;
        }
        if reactive.is_eager() {
            SCHEDULER.with(|s| {
                s.borrow_mut().pending.insert(id);
            });
        } else if let Some(source) = reactive.source_id() {
            // A computed went stale: everyone who read it is stale too.
            // Its cache stays invalid until the next pull.
            let downstream = Registry::dependents_of(source, &[PropertyKey::Slot]);
            schedule_stale(&downstream);
        }
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        SCHEDULER.with(|s| s.borrow_mut().flushing = false);
    }
}

fn flush() {
    SCHEDULER.with(|s| s.borrow_mut().flushing = true);
    let _guard = FlushGuard;

    let mut passes = 0;
    loop {
        // Snapshot one pass; staleness produced while it executes forms
        // the next pass, so no reaction runs twice within a pass.
        let pass: Vec<SubscriberId> =
            SCHEDULER.with(|s| s.borrow_mut().pending.drain(..).collect());
        if pass.is_empty() {
            break;
        }
        passes += 1;
        if passes > MAX_FLUSH_PASSES {
            tracing::error!(
                dropped = pass.len(),
                "reaction flush did not converge after {MAX_FLUSH_PASSES} passes; \
                 dropping remaining reactions"
            );
            break;
        }
        for id in pass {
            if let Some(reactive) = Registry::get(id) {
                if !reactive.is_disposed() {
                    reactive.run();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::runtime::Reactive;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingReaction {
        id: SubscriberId,
        stale: AtomicBool,
        runs: AtomicUsize,
    }

    impl CountingReaction {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                stale: AtomicBool::new(false),
                runs: AtomicUsize::new(0),
            })
        }
    }

    impl Reactive for CountingReaction {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn mark_stale(&self) -> bool {
            !self.stale.swap(true, Ordering::SeqCst)
        }

        fn is_eager(&self) -> bool {
            true
        }

        fn run(&self) {
            self.stale.store(false, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn is_disposed(&self) -> bool {
            false
        }

        fn source_id(&self) -> Option<NodeId> {
            None
        }
    }

    fn wire(reaction: &Arc<CountingReaction>, node: NodeId) {
        Registry::replace_edges(reaction.id, vec![(node, PropertyKey::Iteration)]);
    }

    #[test]
    fn bare_write_flushes_immediately() {
        let reaction = CountingReaction::new();
        let _handle = Registry::register(reaction.clone());
        let node = NodeId::new();
        wire(&reaction, node);

        notify_write(node, &[PropertyKey::Iteration]);
        assert_eq!(reaction.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batch_coalesces_writes() {
        let reaction = CountingReaction::new();
        let _handle = Registry::register(reaction.clone());
        let node = NodeId::new();
        wire(&reaction, node);

        batch(|| {
            for _ in 0..5 {
                notify_write(node, &[PropertyKey::Iteration]);
            }
            // Nothing runs until the outermost scope exits.
            assert_eq!(reaction.runs.load(Ordering::SeqCst), 0);
        });
        assert_eq!(reaction.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_batches_flush_once_at_outermost_exit() {
        let reaction = CountingReaction::new();
        let _handle = Registry::register(reaction.clone());
        let node = NodeId::new();
        wire(&reaction, node);

        batch(|| {
            notify_write(node, &[PropertyKey::Iteration]);
            batch(|| {
                notify_write(node, &[PropertyKey::Iteration]);
            });
            assert_eq!(reaction.runs.load(Ordering::SeqCst), 0);
        });
        assert_eq!(reaction.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batch_returns_body_value() {
        assert_eq!(batch(|| 7), 7);
    }
}
