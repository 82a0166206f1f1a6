//! # Guard Table
//!
//! The guard table is the monitor's only shared mutable state: a weakly
//! referenced map from tracked-object identity to the guards currently held
//! on that object, and by whom.
//!
//! ## State Machine
//!
//! Per object, the state is one of:
//!
//! | State | Meaning |
//! |-------|---------|
//! | Empty (entry absent) | No current holder |
//! | Exclusive(holder) | The whole-object guard is held by one context |
//! | Partitioned(name → holder) | Named guards held independently |
//!
//! Invariant: a Partitioned state with no open guards is equivalent to
//! Empty and is removed, never retained. Entries are created lazily on
//! first tracked acquisition and deleted the instant they become empty.
//!
//! ## Concurrency
//!
//! All mutation is serialized behind a single mutex held only for the
//! lookup-and-mutate step. Classification resolution and stack capture
//! happen before the lock is taken; the instrumented method body runs
//! entirely outside it. Acquire/release pairs for a given guard key are
//! therefore totally ordered, and the outcome of any racing pair of
//! acquisitions is determined by arrival order at the lock.
//!
//! ## Lifetime Pressure
//!
//! The table holds only `Weak` references, so tracking an object never
//! extends its lifetime. Entries are pruned three ways: explicitly when the
//! owning handle is dropped ([`forget`](GuardTable::forget)), opportunistically
//! when the table grows past a high-water mark, and on demand via
//! [`sweep`](GuardTable::sweep).

use crate::context::{ContextId, StackTrace};
use crate::violation::{ContextSnapshot, Violation};
use parking_lot::Mutex;
use racewatch_registry::GuardName;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Identity of a tracked object: the address of its shared allocation.
///
/// Identity-based by definition - tracked objects are never compared by
/// value. An identity is only meaningful while the object is alive; the
/// table guards against address reuse by pruning entries whose weak
/// reference observes collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Derives the identity of a shared allocation.
    #[must_use]
    pub fn of(object: &Arc<dyn Any + Send + Sync>) -> Self {
        Self(Arc::as_ptr(object).cast::<()>() as usize)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A monitored object's identity card: everything the monitor needs to
/// track it without owning it.
///
/// Built once per tracked object by the interception boundary and handed
/// to every `on_call`/`on_return` event. Holds the object only weakly.
#[derive(Debug)]
pub struct ObjectRef {
    id: ObjectId,
    type_id: TypeId,
    type_name: &'static str,
    object: Weak<dyn Any + Send + Sync>,
    frozen: AtomicBool,
}

impl ObjectRef {
    /// Creates a reference for a shared value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        let object: Arc<dyn Any + Send + Sync> = value.clone();
        Self {
            id: ObjectId::of(&object),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            object: Arc::downgrade(&object),
            frozen: AtomicBool::new(false),
        }
    }

    /// The object's identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// The object's type identity, used for classification lookup.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The object's type name, used for violation reports.
    #[inline]
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Marks the object frozen. Frozen objects are permanently exempt from
    /// tracking; there is no thaw.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Returns true if the object has been frozen.
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns true if the underlying object is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        Weak::clone(&self.object)
    }
}

/// The guard being acquired or released: the whole-object guard, or one
/// named partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKey {
    /// The single, unnamed whole-object guard.
    Exclusive,
    /// A named partition of the access surface.
    Named(GuardName),
}

impl fmt::Display for GuardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclusive => f.write_str("exclusive"),
            Self::Named(name) => name.fmt(f),
        }
    }
}

impl Serialize for GuardKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One open guard: who holds it, on what stack, and how deep the holder's
/// re-entrant nesting currently is.
#[derive(Debug)]
struct HolderCell {
    context: ContextId,
    stack: StackTrace,
    depth: u32,
}

impl HolderCell {
    fn new(context: ContextId, stack: StackTrace) -> Self {
        Self {
            context,
            stack,
            depth: 1,
        }
    }

    fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot::new(self.context, self.stack.clone())
    }
}

/// Guard state for one tracked object.
#[derive(Debug)]
enum GuardState {
    Exclusive(HolderCell),
    Partitioned(BTreeMap<GuardName, HolderCell>),
}

#[derive(Debug)]
struct GuardEntry {
    object: Weak<dyn Any + Send + Sync>,
    state: GuardState,
}

/// Read-only view of one open guard, for assertions and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderSnapshot {
    /// The holding context.
    pub context: ContextId,
    /// Current re-entrant nesting depth.
    pub depth: u32,
}

/// Read-only view of one object's guard state.
///
/// `None` from [`GuardTable::snapshot`] means Empty: no guards open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardStateSnapshot {
    /// The whole-object guard is held.
    Exclusive(HolderSnapshot),
    /// Named guards are held; sorted by guard name.
    Partitioned(Vec<(GuardName, HolderSnapshot)>),
}

struct TableInner {
    entries: HashMap<ObjectId, GuardEntry>,
    sweep_threshold: usize,
    next_sweep: usize,
}

impl TableInner {
    fn prune_dead(&mut self, id: ObjectId) {
        if let Some(entry) = self.entries.get(&id) {
            if entry.object.strong_count() == 0 {
                self.entries.remove(&id);
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.object.strong_count() > 0);
        self.next_sweep = (self.entries.len() * 2).max(self.sweep_threshold);
        before - self.entries.len()
    }

    fn maybe_sweep(&mut self) {
        if self.sweep_threshold > 0 && self.entries.len() >= self.next_sweep {
            self.sweep();
        }
    }
}

/// The per-object guard table.
///
/// See the module docs for the state machine and locking discipline. The
/// table never blocks user code: acquisition either succeeds or returns a
/// [`Violation`] immediately, and a failed acquisition leaves the table
/// exactly as it found it.
pub struct GuardTable {
    inner: Mutex<TableInner>,
}

impl GuardTable {
    /// Creates a table that sweeps dead entries when it grows past
    /// `sweep_threshold` live entries. A threshold of zero disables the
    /// opportunistic sweep; [`sweep`](Self::sweep) remains available.
    #[must_use]
    pub fn new(sweep_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                entries: HashMap::new(),
                sweep_threshold,
                next_sweep: sweep_threshold.max(1),
            }),
        }
    }

    /// Attempts to acquire `key` on `object` for `context`.
    ///
    /// `stack` is the requesting context's stack, captured by the caller
    /// before the lock is taken: on success it is recorded as the holder's
    /// stack, on conflict it becomes the requester's side of the violation.
    ///
    /// Same-context re-acquisition of a held guard succeeds and deepens the
    /// holder's nesting count; the guard clears only when the outermost
    /// call returns.
    ///
    /// An exclusive request against a partitioned state (or vice versa) is
    /// a classification inconsistency and conflicts conservatively.
    pub fn try_acquire(
        &self,
        object: &ObjectRef,
        method: &str,
        key: GuardKey,
        context: ContextId,
        stack: StackTrace,
    ) -> crate::violation::Result<()> {
        let conflict = {
            let mut inner = self.inner.lock();
            inner.prune_dead(object.id());

            let conflict = match inner.entries.entry(object.id()) {
                Entry::Vacant(slot) => {
                    let cell = HolderCell::new(context, stack.clone());
                    let state = match key {
                        GuardKey::Exclusive => GuardState::Exclusive(cell),
                        GuardKey::Named(name) => {
                            GuardState::Partitioned(BTreeMap::from([(name, cell)]))
                        }
                    };
                    slot.insert(GuardEntry {
                        object: object.downgrade(),
                        state,
                    });
                    None
                }
                Entry::Occupied(mut slot) => match (&mut slot.get_mut().state, key) {
                    (GuardState::Exclusive(holder), GuardKey::Exclusive) => {
                        if holder.context == context {
                            holder.depth += 1;
                            None
                        } else {
                            Some(holder.snapshot())
                        }
                    }
                    (GuardState::Partitioned(guards), GuardKey::Named(name)) => {
                        match guards.entry(name) {
                            std::collections::btree_map::Entry::Vacant(open) => {
                                open.insert(HolderCell::new(context, stack.clone()));
                                None
                            }
                            std::collections::btree_map::Entry::Occupied(mut open) => {
                                let holder = open.get_mut();
                                if holder.context == context {
                                    holder.depth += 1;
                                    None
                                } else {
                                    Some(holder.snapshot())
                                }
                            }
                        }
                    }
                    // Classification mode mismatch for this object: the
                    // same type resolved both exclusive and named guards.
                    // Conflict conservatively against the current holder.
                    (GuardState::Exclusive(holder), GuardKey::Named(_)) => Some(holder.snapshot()),
                    (GuardState::Partitioned(guards), GuardKey::Exclusive) => {
                        match guards.values().next() {
                            Some(holder) => Some(holder.snapshot()),
                            // An empty partition map is Empty; claim it.
                            None => {
                                slot.get_mut().state =
                                    GuardState::Exclusive(HolderCell::new(context, stack.clone()));
                                None
                            }
                        }
                    }
                },
            };

            if conflict.is_none() {
                inner.maybe_sweep();
            }
            conflict
        };

        match conflict {
            None => Ok(()),
            Some(holder) => Err(Violation::new(
                object.type_name(),
                method,
                key,
                holder,
                ContextSnapshot::new(context, stack),
            )),
        }
    }

    /// Releases `key` on `object` for `context`.
    ///
    /// Only the recorded holder can release: a release from any other
    /// context is ignored (it never held the guard), as is a release with
    /// no matching acquire - both indicate accesses that predate monitor
    /// enablement, not detector bugs. When the last guard on an object
    /// clears, the entry is removed entirely.
    pub fn release(&self, object: &ObjectRef, key: GuardKey, context: ContextId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get_mut(&object.id()) else {
            return;
        };

        let now_empty = match (&mut entry.state, key) {
            (GuardState::Exclusive(holder), GuardKey::Exclusive) => {
                if holder.context != context {
                    return;
                }
                holder.depth -= 1;
                holder.depth == 0
            }
            (GuardState::Partitioned(guards), GuardKey::Named(name)) => {
                if let Some(holder) = guards.get_mut(&name) {
                    if holder.context != context {
                        return;
                    }
                    holder.depth -= 1;
                    if holder.depth == 0 {
                        guards.remove(&name);
                    }
                }
                guards.is_empty()
            }
            // Mode mismatch on release: nothing this context could hold.
            _ => return,
        };

        if now_empty {
            inner.entries.remove(&object.id());
        }
    }

    /// Returns a read-only snapshot of one object's guard state, or `None`
    /// if no guards are open on it.
    #[must_use]
    pub fn snapshot(&self, id: ObjectId) -> Option<GuardStateSnapshot> {
        let inner = self.inner.lock();
        inner.entries.get(&id).map(|entry| match &entry.state {
            GuardState::Exclusive(holder) => GuardStateSnapshot::Exclusive(HolderSnapshot {
                context: holder.context,
                depth: holder.depth,
            }),
            GuardState::Partitioned(guards) => GuardStateSnapshot::Partitioned(
                guards
                    .iter()
                    .map(|(name, holder)| {
                        (
                            *name,
                            HolderSnapshot {
                                context: holder.context,
                                depth: holder.depth,
                            },
                        )
                    })
                    .collect(),
            ),
        })
    }

    /// Drops all guard state for one object.
    ///
    /// Called by the interception boundary when the last handle to the
    /// object is dropped: explicit unregistration keyed to disposal.
    pub fn forget(&self, id: ObjectId) {
        self.inner.lock().entries.remove(&id);
    }

    /// Removes entries whose objects have been collected. Returns the
    /// number of entries removed.
    pub fn sweep(&self) -> usize {
        self.inner.lock().sweep()
    }

    /// Discards all guard state unconditionally.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of objects with open guards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if no guards are open anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl fmt::Debug for GuardTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardTable")
            .field("tracked", &self.len())
            .finish()
    }
}
