//! Tracking Context Stack
//!
//! The context stack records which computation is currently running so that
//! property reads can attribute themselves to it. This enables automatic
//! dependency discovery: when an observable slot is read, the read lands in
//! the top frame, and the computation commits the collected reads as its
//! dependency set after a successful run.
//!
//! # Implementation
//!
//! A thread-local stack of frames. Entering a tracked scope (running a
//! computed or a reaction) pushes a frame; the frame pops when the guard
//! drops, on every exit path including panics. Nested scopes are legal: a
//! reaction that reads a computed pushes the computed's frame on top while
//! it evaluates, so the nested reads belong to the computed and the outer
//! frame only records "this computed was read".
//!
//! `untracked` pushes an inert frame, so incidental reads inside it escape
//! tracking even when an outer computation is active.

use std::cell::RefCell;

use super::subscriber::{NodeId, SubscriberId};
use crate::observable::PropertyKey;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// One entry in the tracking stack.
struct Frame {
    /// The computation this frame belongs to. `None` for untracked scopes.
    subscriber: Option<SubscriberId>,
    /// Reads recorded while this frame was on top, in read order.
    reads: Vec<(NodeId, PropertyKey)>,
}

/// Guard for a tracking frame. Pops the frame when dropped.
///
/// The drop-based pop is what keeps the stack consistent when a user
/// function panics mid-run.
pub struct TrackingFrame {
    subscriber: Option<SubscriberId>,
    finished: bool,
}

impl TrackingFrame {
    /// Push a tracked frame for the given computation.
    pub fn enter(subscriber: SubscriberId) -> Self {
        Self::push(Some(subscriber))
    }

    /// Push an inert frame: reads recorded while it is on top go nowhere.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber,
                reads: Vec::new(),
            });
        });
        Self {
            subscriber,
            finished: false,
        }
    }

    /// Whether a tracked computation is currently on top of the stack.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// The computation reads currently attribute to, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.subscriber)
        })
    }

    /// Record a read of `(node, key)` against the top frame.
    ///
    /// A no-op when the stack is empty or the top frame is untracked, so
    /// incidental reads outside any computation have no registry side
    /// effects.
    pub fn record_read(node: NodeId, key: PropertyKey) {
        CONTEXT_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if frame.subscriber.is_some() {
                    frame.reads.push((node, key));
                }
            }
        });
    }

    /// Pop this frame and return the reads it collected, in read order.
    ///
    /// Consumes the guard; the caller commits the reads to the registry
    /// only after a successful run.
    pub fn finish(mut self) -> Vec<(NodeId, PropertyKey)> {
        self.finished = true;
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(
                popped.as_ref().map(|f| f.subscriber) == Some(self.subscriber),
                "tracking frame mismatch on finish"
            );
            popped.map(|frame| frame.reads).unwrap_or_default()
        })
    }
}

impl Drop for TrackingFrame {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(
                popped.map(|f| f.subscriber) == Some(self.subscriber),
                "tracking frame mismatch on drop"
            );
        });
    }
}

/// Run `f` with dependency tracking suppressed.
///
/// Reads inside `f` create no edges, even when called from inside a
/// computed or reaction body.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _frame = TrackingFrame::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!TrackingFrame::is_active());
        assert!(TrackingFrame::current_subscriber().is_none());

        {
            let _frame = TrackingFrame::enter(id);

            assert!(TrackingFrame::is_active());
            assert_eq!(TrackingFrame::current_subscriber(), Some(id));
        }

        // Frame should be cleaned up after drop
        assert!(!TrackingFrame::is_active());
        assert!(TrackingFrame::current_subscriber().is_none());
    }

    #[test]
    fn frame_collects_reads() {
        let id = SubscriberId::new();
        let node = NodeId::new();
        let frame = TrackingFrame::enter(id);

        TrackingFrame::record_read(node, PropertyKey::Index(0));
        TrackingFrame::record_read(node, PropertyKey::Iteration);

        let reads = frame.finish();
        assert_eq!(
            reads,
            vec![(node, PropertyKey::Index(0)), (node, PropertyKey::Iteration)]
        );
        assert!(!TrackingFrame::is_active());
    }

    #[test]
    fn nested_frames() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let node = NodeId::new();

        {
            let frame1 = TrackingFrame::enter(id1);
            TrackingFrame::record_read(node, PropertyKey::Iteration);
            assert_eq!(TrackingFrame::current_subscriber(), Some(id1));

            {
                let frame2 = TrackingFrame::enter(id2);
                assert_eq!(TrackingFrame::current_subscriber(), Some(id2));
                // Nested reads belong to the inner frame only.
                TrackingFrame::record_read(node, PropertyKey::Index(3));
                assert_eq!(frame2.finish(), vec![(node, PropertyKey::Index(3))]);
            }

            // After the inner frame pops, the outer is current again.
            assert_eq!(TrackingFrame::current_subscriber(), Some(id1));
            assert_eq!(frame1.finish(), vec![(node, PropertyKey::Iteration)]);
        }

        assert!(TrackingFrame::current_subscriber().is_none());
    }

    #[test]
    fn untracked_suppresses_reads() {
        let id = SubscriberId::new();
        let node = NodeId::new();
        let frame = TrackingFrame::enter(id);

        untracked(|| {
            assert!(!TrackingFrame::is_active());
            TrackingFrame::record_read(node, PropertyKey::Iteration);
        });

        TrackingFrame::record_read(node, PropertyKey::Index(1));
        assert_eq!(frame.finish(), vec![(node, PropertyKey::Index(1))]);
    }

    #[test]
    fn frame_pops_on_panic() {
        let id = SubscriberId::new();
        let result = std::panic::catch_unwind(|| {
            let _frame = TrackingFrame::enter(id);
            panic!("user code failed");
        });
        assert!(result.is_err());
        assert!(!TrackingFrame::is_active());
    }
}
