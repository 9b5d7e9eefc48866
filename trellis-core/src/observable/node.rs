//! Observable Nodes
//!
//! An `ObservableNode` wraps one raw container (object, array, map, set)
//! or one boxed value. `ObservableValue` is the cheap shared handle to a
//! node and carries the accessor surface: in a systems-language port of
//! transparent property interception, every observable container is
//! accessed through `get`/`set`/`delete`/`has`/`keys` methods the engine
//! controls.
//!
//! # Read path
//!
//! Every accessor read records `(node, key)` into the active tracking
//! frame; enumeration-class reads (`len`, `keys`, `values`) record the
//! collection-level [`PropertyKey::Iteration`] sentinel. Reads outside any
//! computation have no registry side effects.
//!
//! In deep mode, nested containers are wrapped lazily on first read and
//! the wrapper is memoized into the slot, so the same child is returned on
//! every subsequent read (identity stability). Shallow nodes return nested
//! containers as raw clones.
//!
//! # Write path
//!
//! A write that does not change the slot under shallow equality
//! ([`Value::shallow_eq`]) is a no-op. A changing write bumps the node
//! revision and notifies dependents of the touched keys, plus the
//! iteration sentinel when membership or size changed. Notification
//! happens after the storage lock is released, so reactions running in an
//! implicit flush can freely read the node again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use smallvec::{smallvec, SmallVec};

use super::annotation::Annotation;
use super::key::PropertyKey;
use crate::reactive::{notify_write, Computed, NodeId, TrackingFrame};
use crate::value::{Scalar, Value};

/// The container class of an observable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservableKind {
    Object,
    Array,
    Map,
    Set,
    Boxed,
}

/// Whether nested containers get wrapped on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Deep,
    Shallow,
}

enum Storage {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Scalar, Value>),
    Set(IndexSet<Scalar>),
    BoxSlot(Value),
}

pub(crate) struct ObservableNode {
    id: NodeId,
    kind: ObservableKind,
    mode: Mode,
    /// Bumped on every effective mutation.
    revision: AtomicU64,
    storage: RwLock<Storage>,
    /// Per-field annotation overrides, set by the annotation resolver.
    overrides: RwLock<HashMap<String, Annotation>>,
    /// Computed members installed by the annotation resolver.
    members: RwLock<HashMap<String, Computed<Value>>>,
}

/// Shared handle to an observable container or boxed slot.
///
/// Handles are cheap to clone and compare by pointer identity: two handles
/// to the same node are the same observable.
#[derive(Clone)]
pub struct ObservableValue {
    node: Arc<ObservableNode>,
}

type ChangedKeys = SmallVec<[PropertyKey; 2]>;

impl ObservableNode {
    fn new(kind: ObservableKind, mode: Mode, storage: Storage) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::new(),
            kind,
            mode,
            revision: AtomicU64::new(0),
            storage: RwLock::new(storage),
            overrides: RwLock::new(HashMap::new()),
            members: RwLock::new(HashMap::new()),
        })
    }

    fn track(&self, key: PropertyKey) {
        TrackingFrame::record_read(self.id, key);
    }

    fn bump_and_notify(&self, keys: &[PropertyKey]) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        notify_write(self.id, keys);
    }

    /// Resolve a slot for a read: wrap a raw container in place when the
    /// node mode or a field override says so, memoizing the wrapper.
    fn resolve_slot(&self, slot: &mut Value, field: Option<&str>) -> Value {
        if !slot.is_container() {
            return slot.clone();
        }
        let explicit = field.and_then(|name| self.overrides.read().get(name).cloned());
        let effective = match (explicit, self.mode) {
            (Some(annotation), _) => annotation,
            (None, Mode::Deep) => Annotation::Deep,
            (None, Mode::Shallow) => Annotation::Ref,
        };
        match effective {
            // Pass-through escape hatch; also covers shallow-node children.
            Annotation::Ref | Annotation::Computed(_) => slot.clone(),
            Annotation::Deep | Annotation::Shallow | Annotation::Boxed => {
                let child_mode = if matches!(effective, Annotation::Shallow) {
                    Mode::Shallow
                } else {
                    Mode::Deep
                };
                let taken = std::mem::replace(slot, Value::null());
                let wrapped = if matches!(effective, Annotation::Boxed) {
                    ObservableValue::new_box(taken, Mode::Deep)
                } else {
                    ObservableValue::from_container(taken, child_mode)
                };
                *slot = Value::Observable(wrapped.clone());
                Value::Observable(wrapped)
            }
        }
    }
}

impl ObservableValue {
    /// Wrap a raw container. Already-wrapped values return the existing
    /// node; scalars are not containers and wrap into a box elsewhere.
    pub(crate) fn from_container(value: Value, mode: Mode) -> Self {
        let storage = match value {
            Value::Observable(existing) => return existing,
            Value::Object(fields) => Storage::Object(fields),
            Value::Array(items) => Storage::Array(items),
            Value::Map(entries) => Storage::Map(entries),
            Value::Set(members) => Storage::Set(members),
            scalar @ Value::Scalar(_) => Storage::BoxSlot(scalar),
        };
        let kind = match &storage {
            Storage::Object(_) => ObservableKind::Object,
            Storage::Array(_) => ObservableKind::Array,
            Storage::Map(_) => ObservableKind::Map,
            Storage::Set(_) => ObservableKind::Set,
            Storage::BoxSlot(_) => ObservableKind::Boxed,
        };
        Self {
            node: ObservableNode::new(kind, mode, storage),
        }
    }

    /// Wrap any value in a single-slot box. In deep mode a container in
    /// the slot wraps on read; in shallow mode it reads back raw.
    pub(crate) fn new_box(value: Value, mode: Mode) -> Self {
        Self {
            node: ObservableNode::new(ObservableKind::Boxed, mode, Storage::BoxSlot(value)),
        }
    }

    pub(crate) fn set_overrides(&self, overrides: HashMap<String, Annotation>) {
        *self.node.overrides.write() = overrides;
    }

    /// Install a lazily-evaluated, cached, tracked member on an object
    /// node, read through `get(name)`. This is how getter-style fields
    /// become computed values.
    pub(crate) fn define_computed(
        &self,
        name: &str,
        derive: Arc<dyn Fn(&ObservableValue) -> Value + Send + Sync>,
    ) {
        // Weak back-reference: members must not keep their host alive.
        let weak: Weak<ObservableNode> = Arc::downgrade(&self.node);
        let member = Computed::new(move || match weak.upgrade() {
            Some(node) => derive(&ObservableValue { node }),
            None => Value::null(),
        });
        self.node.members.write().insert(name.to_string(), member);
    }

    /// The container class of this observable.
    pub fn kind(&self) -> ObservableKind {
        self.node.kind
    }

    /// Pointer identity: whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn node_id(&self) -> NodeId {
        self.node.id
    }

    /// How many effective mutations this node has seen.
    pub fn revision(&self) -> u64 {
        self.node.revision.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Object / map entries
    // ------------------------------------------------------------------

    /// Read an entry. Missing entries read as null and are still tracked,
    /// so a later insert invalidates the reader.
    pub fn get<K: Into<Scalar>>(&self, key: K) -> Value {
        let key = key.into();
        match self.node.kind {
            ObservableKind::Object => {
                let name = key.to_key_string();
                self.node
                    .track(PropertyKey::Entry(Scalar::from(name.as_str())));
                let member = self.node.members.read().get(&name).cloned();
                if let Some(member) = member {
                    return member.get();
                }
                let mut storage = self.node.storage.write();
                match &mut *storage {
                    Storage::Object(fields) => match fields.get_mut(&name) {
                        Some(slot) => self.node.resolve_slot(slot, Some(name.as_str())),
                        None => Value::null(),
                    },
                    _ => Value::null(),
                }
            }
            ObservableKind::Map => {
                self.node.track(PropertyKey::Entry(key.clone()));
                let mut storage = self.node.storage.write();
                match &mut *storage {
                    Storage::Map(entries) => match entries.get_mut(&key) {
                        Some(slot) => self.node.resolve_slot(slot, None),
                        None => Value::null(),
                    },
                    _ => Value::null(),
                }
            }
            ObservableKind::Array => match key.as_i64() {
                Some(i) if i >= 0 => self.get_index(i as usize),
                _ => {
                    tracing::debug!(key = %key, "non-index key read on observable array");
                    Value::null()
                }
            },
            ObservableKind::Boxed => self.get_boxed(),
            ObservableKind::Set => {
                tracing::debug!("keyed read on observable set; use has_member");
                Value::null()
            }
        }
    }

    /// Write an entry. A value equal to the current one under shallow
    /// equality is a no-op: no dependent is marked stale.
    pub fn set<K: Into<Scalar>>(&self, key: K, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.node.kind {
            ObservableKind::Object => {
                let name = key.to_key_string();
                let outcome = {
                    let mut storage = self.node.storage.write();
                    match &mut *storage {
                        Storage::Object(fields) => match fields.get(&name) {
                            Some(old) if old.shallow_eq(&value) => None,
                            Some(_) => {
                                fields.insert(name.clone(), value);
                                Some(false)
                            }
                            None => {
                                fields.insert(name.clone(), value);
                                Some(true)
                            }
                        },
                        _ => None,
                    }
                };
                if let Some(added) = outcome {
                    let mut keys: ChangedKeys =
                        smallvec![PropertyKey::Entry(Scalar::from(name.as_str()))];
                    if added {
                        keys.push(PropertyKey::Iteration);
                    }
                    self.node.bump_and_notify(&keys);
                }
            }
            ObservableKind::Map => {
                let outcome = {
                    let mut storage = self.node.storage.write();
                    match &mut *storage {
                        Storage::Map(entries) => match entries.get(&key) {
                            Some(old) if old.shallow_eq(&value) => None,
                            Some(_) => {
                                entries.insert(key.clone(), value);
                                Some(false)
                            }
                            None => {
                                entries.insert(key.clone(), value);
                                Some(true)
                            }
                        },
                        _ => None,
                    }
                };
                if let Some(added) = outcome {
                    let mut keys: ChangedKeys = smallvec![PropertyKey::Entry(key)];
                    if added {
                        keys.push(PropertyKey::Iteration);
                    }
                    self.node.bump_and_notify(&keys);
                }
            }
            ObservableKind::Array => match key.as_i64() {
                Some(i) if i >= 0 => self.set_index(i as usize, value),
                _ => tracing::debug!(key = %key, "non-index key write on observable array"),
            },
            ObservableKind::Boxed => self.set_boxed(value),
            ObservableKind::Set => {
                tracing::debug!("keyed write on observable set; use add");
            }
        }
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete<K: Into<Scalar>>(&self, key: K) -> bool {
        let key = key.into();
        let removed_key = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Object(fields) => {
                    let name = key.to_key_string();
                    fields
                        .shift_remove(&name)
                        .map(|_| PropertyKey::Entry(Scalar::from(name.as_str())))
                }
                Storage::Map(entries) => entries
                    .shift_remove(&key)
                    .map(|_| PropertyKey::Entry(key.clone())),
                _ => {
                    tracing::debug!(key = %key, "delete on non-keyed observable");
                    None
                }
            }
        };
        match removed_key {
            Some(entry) => {
                let keys: ChangedKeys = smallvec![entry, PropertyKey::Iteration];
                self.node.bump_and_notify(&keys);
                true
            }
            None => false,
        }
    }

    /// Whether an entry exists. Tracked against the entry key, so both
    /// inserting and deleting it invalidate the reader.
    pub fn has<K: Into<Scalar>>(&self, key: K) -> bool {
        let key = key.into();
        let storage = self.node.storage.read();
        match &*storage {
            Storage::Object(fields) => {
                let name = key.to_key_string();
                self.node
                    .track(PropertyKey::Entry(Scalar::from(name.as_str())));
                fields.contains_key(&name) || self.node.members.read().contains_key(&name)
            }
            Storage::Map(entries) => {
                self.node.track(PropertyKey::Entry(key.clone()));
                entries.contains_key(&key)
            }
            Storage::Set(members) => {
                self.node.track(PropertyKey::Entry(key.clone()));
                members.contains(&key)
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Read by index. Out-of-bounds reads are null, and tracked.
    pub fn get_index(&self, index: usize) -> Value {
        self.node.track(PropertyKey::Index(index));
        let mut storage = self.node.storage.write();
        match &mut *storage {
            Storage::Array(items) => match items.get_mut(index) {
                Some(slot) => self.node.resolve_slot(slot, None),
                None => Value::null(),
            },
            _ => Value::null(),
        }
    }

    /// Write by index. Writing one past the end appends; writing further
    /// past pads with nulls, as sparse assignment does in the source
    /// semantics.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let changed: Option<ChangedKeys> = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Array(items) => {
                    if index < items.len() {
                        if items[index].shallow_eq(&value) {
                            None
                        } else {
                            items[index] = value;
                            Some(smallvec![PropertyKey::Index(index)])
                        }
                    } else {
                        items.resize(index, Value::null());
                        items.push(value);
                        Some(smallvec![PropertyKey::Index(index), PropertyKey::Iteration])
                    }
                }
                _ => {
                    tracing::debug!("set_index on non-array observable");
                    None
                }
            }
        };
        if let Some(keys) = changed {
            self.node.bump_and_notify(&keys);
        }
    }

    /// Append an element.
    pub fn push(&self, value: impl Into<Value>) {
        let value = value.into();
        let appended_at = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Array(items) => {
                    items.push(value);
                    Some(items.len() - 1)
                }
                _ => {
                    tracing::debug!("push on non-array observable");
                    None
                }
            }
        };
        if let Some(index) = appended_at {
            let keys: ChangedKeys = smallvec![PropertyKey::Index(index), PropertyKey::Iteration];
            self.node.bump_and_notify(&keys);
        }
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<Value> {
        let popped = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Array(items) => items.pop().map(|value| (value, items.len())),
                _ => None,
            }
        };
        popped.map(|(value, index)| {
            let keys: ChangedKeys = smallvec![PropertyKey::Index(index), PropertyKey::Iteration];
            self.node.bump_and_notify(&keys);
            value
        })
    }

    /// Insert at an index, shifting later elements.
    pub fn insert_index(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let new_len = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Array(items) if index <= items.len() => {
                    items.insert(index, value);
                    Some(items.len())
                }
                _ => None,
            }
        };
        if let Some(new_len) = new_len {
            // Every index from the insertion point shifted.
            let mut keys: ChangedKeys = smallvec![PropertyKey::Iteration];
            keys.extend((index..new_len).map(PropertyKey::Index));
            self.node.bump_and_notify(&keys);
        }
    }

    /// Remove at an index, shifting later elements.
    pub fn remove_index(&self, index: usize) -> Option<Value> {
        let removed = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Array(items) if index < items.len() => {
                    Some((items.remove(index), items.len()))
                }
                _ => None,
            }
        };
        removed.map(|(value, old_top)| {
            let mut keys: ChangedKeys = smallvec![PropertyKey::Iteration];
            keys.extend((index..=old_top).map(PropertyKey::Index));
            self.node.bump_and_notify(&keys);
            value
        })
    }

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------

    /// Add a member. Returns whether it was newly inserted.
    pub fn add(&self, member: impl Into<Scalar>) -> bool {
        let member = member.into();
        let inserted = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Set(members) => members.insert(member.clone()),
                _ => {
                    tracing::debug!("add on non-set observable");
                    false
                }
            }
        };
        if inserted {
            let keys: ChangedKeys = smallvec![PropertyKey::Entry(member), PropertyKey::Iteration];
            self.node.bump_and_notify(&keys);
        }
        inserted
    }

    /// Remove a member. Returns whether it was present.
    pub fn delete_member(&self, member: impl Into<Scalar>) -> bool {
        let member = member.into();
        let removed = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::Set(members) => members.shift_remove(&member),
                _ => false,
            }
        };
        if removed {
            let keys: ChangedKeys = smallvec![PropertyKey::Entry(member), PropertyKey::Iteration];
            self.node.bump_and_notify(&keys);
        }
        removed
    }

    /// Membership test, tracked against the member key.
    pub fn has_member(&self, member: impl Into<Scalar>) -> bool {
        self.has(member)
    }

    // ------------------------------------------------------------------
    // Collection-level reads
    // ------------------------------------------------------------------

    /// Entry count / length / set size. Tracks the iteration sentinel.
    pub fn len(&self) -> usize {
        self.node.track(PropertyKey::Iteration);
        let storage = self.node.storage.read();
        match &*storage {
            Storage::Object(fields) => fields.len(),
            Storage::Array(items) => items.len(),
            Storage::Map(entries) => entries.len(),
            Storage::Set(members) => members.len(),
            Storage::BoxSlot(_) => {
                tracing::debug!("len on boxed observable");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The keys of this collection, in order. Tracks the iteration
    /// sentinel.
    pub fn keys(&self) -> Vec<Scalar> {
        self.node.track(PropertyKey::Iteration);
        let storage = self.node.storage.read();
        match &*storage {
            Storage::Object(fields) => {
                fields.keys().map(|k| Scalar::from(k.as_str())).collect()
            }
            Storage::Array(items) => (0..items.len()).map(Scalar::from).collect(),
            Storage::Map(entries) => entries.keys().cloned().collect(),
            Storage::Set(members) => members.iter().cloned().collect(),
            Storage::BoxSlot(_) => Vec::new(),
        }
    }

    /// Snapshot of all values, wrapped per the node's mode. Tracks the
    /// iteration sentinel plus every entry returned: the sentinel covers
    /// membership changes, the per-entry keys cover in-place writes to
    /// existing entries.
    pub fn values(&self) -> Vec<Value> {
        self.node.track(PropertyKey::Iteration);
        let mut storage = self.node.storage.write();
        match &mut *storage {
            Storage::Object(fields) => fields
                .iter_mut()
                .map(|(name, slot)| {
                    self.node
                        .track(PropertyKey::Entry(Scalar::from(name.as_str())));
                    self.node.resolve_slot(slot, Some(name.as_str()))
                })
                .collect(),
            Storage::Array(items) => items
                .iter_mut()
                .enumerate()
                .map(|(i, slot)| {
                    self.node.track(PropertyKey::Index(i));
                    self.node.resolve_slot(slot, None)
                })
                .collect(),
            Storage::Map(entries) => entries
                .iter_mut()
                .map(|(key, slot)| {
                    self.node.track(PropertyKey::Entry(key.clone()));
                    self.node.resolve_slot(slot, None)
                })
                .collect(),
            Storage::Set(members) => members.iter().cloned().map(Value::Scalar).collect(),
            Storage::BoxSlot(slot) => {
                self.node.track(PropertyKey::Slot);
                vec![self.node.resolve_slot(slot, None)]
            }
        }
    }

    // ------------------------------------------------------------------
    // Boxed slot
    // ------------------------------------------------------------------

    /// Read the boxed value.
    pub fn get_boxed(&self) -> Value {
        self.node.track(PropertyKey::Slot);
        let mut storage = self.node.storage.write();
        match &mut *storage {
            Storage::BoxSlot(slot) => self.node.resolve_slot(slot, None),
            _ => {
                tracing::debug!("get_boxed on non-box observable");
                Value::null()
            }
        }
    }

    /// Replace the boxed value. Equal values (shallow) are a no-op.
    pub fn set_boxed(&self, value: impl Into<Value>) {
        let value = value.into();
        let changed = {
            let mut storage = self.node.storage.write();
            match &mut *storage {
                Storage::BoxSlot(slot) => {
                    if slot.shallow_eq(&value) {
                        false
                    } else {
                        *slot = value;
                        true
                    }
                }
                _ => {
                    tracing::debug!("set_boxed on non-box observable");
                    false
                }
            }
        };
        if changed {
            self.node.bump_and_notify(&[PropertyKey::Slot]);
        }
    }

    // ------------------------------------------------------------------
    // Escape hatch
    // ------------------------------------------------------------------

    /// Untracked deep snapshot: the plain value underneath, with every
    /// nested observable unwrapped. Safe to hand to non-reactive
    /// consumers and to serialize.
    pub fn raw(&self) -> Value {
        let storage = self.node.storage.read();
        match &*storage {
            Storage::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, slot)| (name.clone(), raw_value(slot)))
                    .collect(),
            ),
            Storage::Array(items) => Value::Array(items.iter().map(raw_value).collect()),
            Storage::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, slot)| (key.clone(), raw_value(slot)))
                    .collect(),
            ),
            Storage::Set(members) => Value::Set(members.clone()),
            Storage::BoxSlot(slot) => raw_value(slot),
        }
    }
}

/// Recursively unwrap observables into plain data. No tracking.
pub(crate) fn raw_value(value: &Value) -> Value {
    match value {
        Value::Observable(o) => o.raw(),
        Value::Array(items) => Value::Array(items.iter().map(raw_value).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, slot)| (name.clone(), raw_value(slot)))
                .collect(),
        ),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, slot)| (key.clone(), raw_value(slot)))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl std::fmt::Debug for ObservableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableValue")
            .field("id", &self.node.id)
            .field("kind", &self.node.kind)
            .field("revision", &self.revision())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{observable, observable_box};
    use crate::reactive::{autorun, Registry, SubscriberId};
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    fn wrap_object(json: serde_json::Value) -> ObservableValue {
        match observable(Value::from(json)) {
            Value::Observable(o) => o,
            other => panic!("expected observable, got {other:?}"),
        }
    }

    #[test]
    fn rewrapping_returns_same_node() {
        let o = wrap_object(json!({"x": 1}));
        let rewrapped = observable(Value::Observable(o.clone()));
        assert!(o.ptr_eq(rewrapped.as_observable().unwrap()));
    }

    #[test]
    fn nested_child_is_memoized() {
        let o = wrap_object(json!({"inner": {"x": 1}}));
        let first = o.get("inner");
        let second = o.get("inner");
        let (Value::Observable(a), Value::Observable(b)) = (first, second) else {
            panic!("deep node must wrap nested containers");
        };
        assert!(a.ptr_eq(&b));
        assert_eq!(a.get("x").as_i64(), Some(1));
    }

    #[test]
    fn untracked_reads_create_no_edges() {
        let o = wrap_object(json!({"x": 1}));
        let _ = o.get("x");
        let _ = o.len();
        // No computation was active, so nothing depends on the node.
        assert!(Registry::dependents_of(o.node_id(), &[PropertyKey::Iteration]).is_empty());
    }

    #[test]
    fn equal_write_does_not_bump_revision() {
        let o = wrap_object(json!({"x": 1}));
        let before = o.revision();
        o.set("x", 1i64);
        assert_eq!(o.revision(), before);
        o.set("x", 2i64);
        assert_eq!(o.revision(), before + 1);
    }

    #[test]
    fn missing_key_reads_as_null_and_exists_after_set() {
        let o = wrap_object(json!({}));
        assert!(o.get("missing").is_null());
        assert!(!o.has("missing"));
        o.set("missing", "here");
        assert!(o.has("missing"));
        assert_eq!(o.get("missing").as_str(), Some("here"));
    }

    #[test]
    fn delete_removes_and_reports() {
        let o = wrap_object(json!({"x": 1}));
        assert!(o.delete("x"));
        assert!(!o.delete("x"));
        assert!(o.get("x").is_null());
    }

    #[test]
    fn array_accessors() {
        let arr = match observable(Value::from(json!([1, 2, 3]))) {
            Value::Observable(o) => o,
            other => panic!("expected observable, got {other:?}"),
        };
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get_index(0).as_i64(), Some(1));
        assert!(arr.get_index(9).is_null());

        arr.push(4i64);
        assert_eq!(arr.len(), 4);

        assert_eq!(arr.pop().unwrap().as_i64(), Some(4));
        assert_eq!(arr.remove_index(0).unwrap().as_i64(), Some(1));
        assert_eq!(arr.get_index(0).as_i64(), Some(2));

        arr.insert_index(0, 0i64);
        assert_eq!(arr.get_index(0).as_i64(), Some(0));

        // Sparse assignment pads with nulls.
        arr.set_index(9, 99i64);
        assert_eq!(arr.len(), 10);
        assert!(arr.get_index(5).is_null());
        assert_eq!(arr.get_index(9).as_i64(), Some(99));
    }

    #[test]
    fn set_membership() {
        let s = ObservableValue::from_container(
            Value::Set(IndexSet::new()),
            Mode::Deep,
        );
        assert!(s.add("a"));
        assert!(!s.add("a"));
        assert!(s.has_member("a"));
        assert!(s.delete_member("a"));
        assert!(!s.has_member("a"));
    }

    #[test]
    fn kind_mismatch_is_a_logged_noop() {
        let o = wrap_object(json!({"x": 1}));
        o.push(1i64);
        assert!(o.pop().is_none());
        assert!(!o.add("x"));
        assert_eq!(o.get("x").as_i64(), Some(1));

        // A box is not a collection; length-class reads are no-ops too.
        let boxed = observable_box(Value::from(7i64));
        assert_eq!(boxed.len(), 0);
    }

    #[test]
    fn values_reader_sees_in_place_entry_change() {
        let o = wrap_object(json!({"x": 1, "y": 2}));
        let runs = Arc::new(AtomicI32::new(0));

        let reader = o.clone();
        let counter = runs.clone();
        let _d = autorun(move || {
            let _ = reader.values();
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // In-place write to an existing entry: no membership change, so
        // only the per-entry edge recorded by the snapshot covers it.
        o.set("x", 42i64);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn values_reader_sees_index_overwrite() {
        let arr = match observable(Value::from(json!([1, 2, 3]))) {
            Value::Observable(o) => o,
            other => panic!("expected observable, got {other:?}"),
        };
        let runs = Arc::new(AtomicI32::new(0));

        let reader = arr.clone();
        let counter = runs.clone();
        let _d = autorun(move || {
            let _ = reader.values();
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        arr.set_index(1, 9i64);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn raw_unwraps_deeply() {
        let o = wrap_object(json!({"a": {"b": [1, 2]}}));
        // Force lazy wrapping of the nested object.
        let _ = o.get("a").as_observable().unwrap().get("b");
        let raw = o.raw();
        assert_eq!(raw, Value::from(json!({"a": {"b": [1, 2]}})));
        assert!(!raw.is_observable());
    }

    #[test]
    fn tracked_read_registers_edge_for_active_computation() {
        let o = wrap_object(json!({"x": 1}));
        let id = SubscriberId::new();
        let frame = TrackingFrame::enter(id);
        let _ = o.get("x");
        let reads = frame.finish();
        assert_eq!(
            reads,
            vec![(o.node_id(), PropertyKey::Entry(Scalar::from("x")))]
        );
    }
}
