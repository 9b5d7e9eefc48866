//! Reactions
//!
//! A reaction is an eager, side-effecting computation. It runs once at
//! creation to establish its first dependency set and produce its first
//! side effect, and thereafter re-runs through the batching scheduler
//! whenever a dependency changes.
//!
//! # Disposal
//!
//! [`autorun`] returns a [`Disposer`]. Calling `dispose` (idempotent) or
//! dropping the disposer removes every dependency edge and prevents all
//! future runs, including a pending one. Disposal while the reaction is
//! mid-run is legal: the in-flight run finishes but does not commit its
//! edge set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::context::{untracked, TrackingFrame};
use super::runtime::{Reactive, ReactiveHandle, Registry};
use super::subscriber::{NodeId, Phase, SubscriberId};

struct ReactionInner {
    subscriber_id: SubscriberId,
    phase: RwLock<Phase>,
    /// Set when a dependency changes while the body is running, so the
    /// reaction re-runs in the next flush pass instead of recursing.
    restale: AtomicBool,
    body: Box<dyn Fn() + Send + Sync>,
}

/// Restores the phase when a run ends, on every exit path.
struct PhaseReset<'a> {
    phase: &'a RwLock<Phase>,
    restale: &'a AtomicBool,
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        let mut phase = self.phase.write();
        if *phase == Phase::Disposed {
            return;
        }
        *phase = if std::thread::panicking() || self.restale.swap(false, Ordering::SeqCst) {
            Phase::Stale
        } else {
            Phase::Clean
        };
    }
}

impl ReactionInner {
    fn execute(&self) {
        {
            let mut phase = self.phase.write();
            if *phase != Phase::Stale {
                return;
            }
            *phase = Phase::Running;
        }

        // The surrounding batch scope defers any flush triggered by writes
        // inside the body until the phase guard has restored state.
        super::batch::batch(|| {
            let frame = TrackingFrame::enter(self.subscriber_id);
            let _reset = PhaseReset {
                phase: &self.phase,
                restale: &self.restale,
            };

            (self.body)();
            let reads = frame.finish();

            // A disposal that raced the run wins: its edges stay pruned.
            if !self.is_disposed() {
                Registry::replace_edges(self.subscriber_id, reads);
            }
        });
    }

    fn dispose(&self) {
        {
            let mut phase = self.phase.write();
            if *phase == Phase::Disposed {
                return;
            }
            *phase = Phase::Disposed;
        }
        Registry::clear_edges(self.subscriber_id);
    }
}

impl Reactive for ReactionInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_stale(&self) -> bool {
        let mut phase = self.phase.write();
        match *phase {
            Phase::Clean => {
                *phase = Phase::Stale;
                true
            }
            Phase::Running => !self.restale.swap(true, Ordering::SeqCst),
            Phase::Stale | Phase::Disposed => false,
        }
    }

    fn is_eager(&self) -> bool {
        true
    }

    fn run(&self) {
        self.execute();
    }

    fn is_disposed(&self) -> bool {
        *self.phase.read() == Phase::Disposed
    }

    fn source_id(&self) -> Option<NodeId> {
        None
    }
}

/// Stops a reaction.
///
/// Dropping the disposer disposes the reaction as well, so bind it for as
/// long as the reaction should stay alive.
pub struct Disposer {
    inner: Arc<ReactionInner>,
    _handle: ReactiveHandle,
}

impl Disposer {
    /// Remove all dependency edges and stop future runs. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Run `body` now and again whenever any observable it read changes.
pub fn autorun<F>(body: F) -> Disposer
where
    F: Fn() + Send + Sync + 'static,
{
    let inner = Arc::new(ReactionInner {
        subscriber_id: SubscriberId::new(),
        phase: RwLock::new(Phase::Stale),
        restale: AtomicBool::new(false),
        body: Box::new(body),
    });
    let handle = Registry::register(inner.clone() as Arc<dyn Reactive>);

    // Immediate first run seeds the dependency set.
    inner.execute();

    Disposer {
        inner,
        _handle: handle,
    }
}

/// Track `select` and call `effect(new, old)` only when the selected value
/// changes (`PartialEq`). The first run only seeds the tracked value. The
/// effect runs untracked: only the selector contributes dependencies.
pub fn reaction<T, S, E>(select: S, effect: E) -> Disposer
where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Fn() -> T + Send + Sync + 'static,
    E: Fn(&T, &T) + Send + Sync + 'static,
{
    let previous: Mutex<Option<T>> = Mutex::new(None);
    autorun(move || {
        let next = select();
        let old = {
            let mut previous = previous.lock();
            match previous.as_ref() {
                Some(old) if *old == next => return,
                Some(old) => {
                    let old = old.clone();
                    *previous = Some(next.clone());
                    Some(old)
                }
                None => {
                    *previous = Some(next.clone());
                    None
                }
            }
        };
        if let Some(old) = old {
            // Only the selector is tracked; reads inside the effect must
            // not become dependencies of the reaction.
            untracked(|| effect(&next, &old));
        }
    })
}
