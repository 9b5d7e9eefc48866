//! Computed Values
//!
//! A `Computed<T>` is a lazy, cached derivation. It re-evaluates only when
//! read while stale, and its dependency set is rediscovered on every run.
//!
//! # How Computed Values Work
//!
//! 1. On first read, the derivation runs inside a tracking frame and the
//!    result is cached.
//!
//! 2. A write to any dependency marks the computed stale; staleness also
//!    cascades to the computed's own readers. Nothing recomputes yet.
//!
//! 3. The next read recomputes, commits the fresh dependency set, and
//!    bumps the computed's revision only if the new value differs from the
//!    cache (`PartialEq`).
//!
//! # Cycles
//!
//! A computed that reads its own value while evaluating (directly or
//! through other computeds) would never terminate. The `Running` phase
//! makes this detectable: such a read fails fast with
//! [`ReactiveError::CyclicComputation`] instead of hanging.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::{untracked, TrackingFrame};
use super::runtime::{Reactive, ReactiveHandle, Registry};
use super::subscriber::{NodeId, Phase, SubscriberId};
use crate::error::ReactiveError;
use crate::observable::PropertyKey;

/// A lazy cached derivation that recomputes only when read while stale.
///
/// Cloning shares state; disposing any clone disposes all of them. When
/// the last clone drops, the computed unregisters and its edges are
/// pruned.
pub struct Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
    _handle: Arc<ReactiveHandle>,
}

struct ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Identity as a dependency source (what readers subscribe to).
    node_id: NodeId,

    /// Identity as a subscriber (the edges this computed holds on others).
    subscriber_id: SubscriberId,

    /// The user-supplied derivation.
    derive: Box<dyn Fn() -> T + Send + Sync>,

    /// Cached result (`None` until first evaluation).
    cache: RwLock<Option<T>>,

    phase: RwLock<Phase>,

    /// Set when a dependency changes while the derivation is running, so
    /// the fresh cache is immediately stale again.
    restale: AtomicBool,

    /// Bumped only when a recompute produces an unequal value.
    revision: AtomicU64,
}

/// Restores the phase when an evaluation ends, on every exit path.
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

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed value. The derivation does not run until the
    /// first read.
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(ComputedInner {
            node_id: NodeId::new(),
            subscriber_id: SubscriberId::new(),
            derive: Box::new(derive),
            cache: RwLock::new(None),
            phase: RwLock::new(Phase::Stale),
            restale: AtomicBool::new(false),
            revision: AtomicU64::new(0),
        });
        let handle = Registry::register(inner.clone() as Arc<dyn Reactive>);
        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Read the value, recomputing if stale.
    ///
    /// Panics on a cyclic evaluation; use [`Computed::try_get`] to handle
    /// the cycle as a value.
    pub fn get(&self) -> T {
        match self.inner.read() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Read the value, recomputing if stale.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        self.inner.read()
    }

    /// Dispose the computed. Idempotent; further invalidation is ignored
    /// and reads return the cached value.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.inner.phase.read()
    }

    /// Revision of the cached value; changes only when a recompute yields
    /// an unequal result.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> std::fmt::Debug for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("phase", &self.phase())
            .field("revision", &self.revision())
            .field("cache", &*self.inner.cache.read())
            .finish()
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn read(&self) -> Result<T, ReactiveError> {
        // The read itself is a dependency of whoever is tracking, even if
        // the evaluation below fails.
        TrackingFrame::record_read(self.node_id, PropertyKey::Slot);

        let phase = *self.phase.read();
        match phase {
            Phase::Running => Err(ReactiveError::CyclicComputation(self.subscriber_id)),
            Phase::Clean => Ok(self
                .cache
                .read()
                .clone()
                .expect("clean computed holds a cached value")),
            Phase::Stale => self.recompute(),
            // Disposed access is a no-op: serve the cache, or evaluate
            // untracked if the computed never ran.
            Phase::Disposed => match self.cache.read().clone() {
                Some(value) => Ok(value),
                None => Ok(untracked(|| (self.derive)())),
            },
        }
    }

    fn recompute(&self) -> Result<T, ReactiveError> {
        {
            let mut phase = self.phase.write();
            if *phase == Phase::Running {
                return Err(ReactiveError::CyclicComputation(self.subscriber_id));
            }
            *phase = Phase::Running;
        }

        // The batch scope defers any flush triggered by writes inside the
        // derivation until the phase guard has restored state.
        super::batch::batch(|| {
            let frame = TrackingFrame::enter(self.subscriber_id);
            let _reset = PhaseReset {
                phase: &self.phase,
                restale: &self.restale,
            };

            let value = (self.derive)();
            let reads = frame.finish();

            // A disposal that raced the run wins: its edges stay pruned.
            if !self.is_disposed() {
                Registry::replace_edges(self.subscriber_id, reads);
            }

            let changed = {
                let cache = self.cache.read();
                cache.as_ref() != Some(&value)
            };
            *self.cache.write() = Some(value.clone());
            if changed {
                self.revision.fetch_add(1, Ordering::SeqCst);
            }

            Ok(value)
        })
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

impl<T> Reactive for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
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
        false
    }

    fn run(&self) {
        // Pull-based: recomputation happens on the next read.
    }

    fn is_disposed(&self) -> bool {
        *self.phase.read() == Phase::Disposed
    }

    fn source_id(&self) -> Option<NodeId> {
        Some(self.node_id)
    }
}

/// Create a lazy cached derivation.
pub fn computed<T, F>(derive: F) -> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(derive)
}
