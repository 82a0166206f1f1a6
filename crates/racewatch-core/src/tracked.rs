//! # Tracked Objects and Access Spans
//!
//! The interception boundary. Whole-process call/return tracing is not a
//! thing Rust offers, so monitored objects are reached exclusively through
//! a [`Tracked`] handle: [`Tracked::enter`] delivers the method-entry event
//! and returns an [`AccessSpan`] whose drop delivers the matching exit
//! event. The monitor's contract is unchanged; only event delivery is
//! explicit.
//!
//! ## Lifetime Discipline
//!
//! The monitor holds the object weakly. The `Tracked` handle owns it, and
//! dropping the last handle unregisters the object from the guard table -
//! explicit disposal-keyed cleanup, backed up by the table's opportunistic
//! sweep.
//!
//! ## Example
//!
//! ```rust
//! use racewatch_core::{Racewatch, RacewatchConfig};
//!
//! struct Counter {
//!     hits: std::sync::atomic::AtomicU64,
//! }
//!
//! let watch = Racewatch::new(RacewatchConfig::default());
//! watch.declare_safe::<Counter>(false);
//! watch.enable();
//!
//! let counter = watch.track(Counter {
//!     hits: std::sync::atomic::AtomicU64::new(0),
//! });
//!
//! {
//!     let span = counter.enter("bump").unwrap();
//!     span.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//! } // guard released here
//! ```

use racewatch_monitor::{AccessMonitor, ObjectId, ObjectRef, Violation};
use std::ops::Deref;
use std::sync::Arc;

struct TrackedShared {
    monitor: Arc<AccessMonitor>,
    object: ObjectRef,
}

impl Drop for TrackedShared {
    fn drop(&mut self) {
        // Last handle gone: the object is leaving monitored life, so its
        // guard state must not linger in the table.
        self.monitor.forget(self.object.id());
    }
}

/// An owning handle to a monitored object.
///
/// Handles are cheap to clone and share one object identity; they may be
/// sent freely between threads and tasks. Sequential hand-off through a
/// channel is exactly the pattern the monitor permits.
pub struct Tracked<T: Send + Sync + 'static> {
    value: Arc<T>,
    shared: Arc<TrackedShared>,
}

impl<T: Send + Sync + 'static> Tracked<T> {
    pub(crate) fn new(monitor: Arc<AccessMonitor>, value: T) -> Self {
        let value = Arc::new(value);
        let object = ObjectRef::new(&value);
        Self {
            value,
            shared: Arc::new(TrackedShared { monitor, object }),
        }
    }

    /// Delivers the method-entry event and opens an access span.
    ///
    /// On conflict under the raising policy, the violation is returned
    /// *before* the caller can touch the value - the span never exists and
    /// no state is recorded for the rejected attempt.
    pub fn enter(&self, method: &'static str) -> Result<AccessSpan<'_, T>, Violation> {
        self.shared.monitor.on_call(&self.shared.object, method)?;
        Ok(AccessSpan {
            tracked: self,
            method,
        })
    }

    /// Marks the object frozen: permanently exempt from tracking,
    /// whatever its type's classification. There is no thaw.
    pub fn freeze(&self) {
        self.shared.object.freeze();
    }

    /// Returns true if the object has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.shared.object.is_frozen()
    }

    /// The object's identity in the guard table.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.shared.object.id()
    }

    /// The monitor-facing reference for this object.
    #[must_use]
    pub fn object_ref(&self) -> &ObjectRef {
        &self.shared.object
    }
}

impl<T: Send + Sync + 'static> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("type", &self.shared.object.type_name())
            .field("id", &self.shared.object.id())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// An open method-scoped access to a tracked object.
///
/// Holds the guard acquired at [`Tracked::enter`]; dropping the span
/// delivers the method-exit event and releases it. Re-entering the same
/// object from the same context nests safely to any depth.
pub struct AccessSpan<'a, T: Send + Sync + 'static> {
    tracked: &'a Tracked<T>,
    method: &'static str,
}

impl<T: Send + Sync + 'static> AccessSpan<'_, T> {
    /// The method name this span was entered with.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.method
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for AccessSpan<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessSpan")
            .field("tracked", &self.tracked)
            .field("method", &self.method)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Deref for AccessSpan<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.tracked.value
    }
}

impl<T: Send + Sync + 'static> Drop for AccessSpan<'_, T> {
    fn drop(&mut self) {
        self.tracked
            .shared
            .monitor
            .on_return(&self.tracked.shared.object, self.method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racewatch_monitor::{ContextScope, MonitorOptions};
    use racewatch_registry::ClassificationRegistry;

    struct Cell(u64);

    fn tracked_cell() -> Tracked<Cell> {
        let registry = Arc::new(ClassificationRegistry::new());
        registry.declare_safe::<Cell>(false);

        let monitor = Arc::new(AccessMonitor::with_options(
            registry,
            MonitorOptions::new().with_stack_capture(false),
        ));
        monitor.enable();
        Tracked::new(monitor, Cell(7))
    }

    #[test]
    fn test_span_gives_access_and_releases() {
        let cell = tracked_cell();

        {
            let span = cell.enter("get").unwrap();
            assert_eq!(span.0, 7);
            assert_eq!(span.method(), "get");
        }

        // Span dropped: no open guards remain.
        assert!(cell.shared.monitor.guard_state_of(cell.object_ref()).is_none());
    }

    #[test]
    fn test_nested_spans_same_context() {
        let cell = tracked_cell();

        let outer = cell.enter("get").unwrap();
        let inner = cell.enter("get").unwrap();
        drop(inner);

        // The outer call is still in flight; the guard must still be held.
        assert!(cell.shared.monitor.guard_state_of(cell.object_ref()).is_some());
        drop(outer);
        assert!(cell.shared.monitor.guard_state_of(cell.object_ref()).is_none());
    }

    #[test]
    fn test_conflict_returns_violation_without_span() {
        let cell = tracked_cell();

        let holder_scope = ContextScope::enter();
        let _held = cell.enter("get").unwrap();
        drop(holder_scope);

        let _rival_scope = ContextScope::enter();
        let violation = cell.enter("get").unwrap_err();
        assert_eq!(violation.method, "get");
    }

    #[test]
    fn test_clones_share_identity() {
        let cell = tracked_cell();
        let other = cell.clone();
        assert_eq!(cell.id(), other.id());
    }

    #[test]
    fn test_drop_unregisters() {
        let cell = tracked_cell();
        let monitor = Arc::clone(&cell.shared.monitor);
        let object_id = cell.id();

        let span = cell.enter("get").unwrap();
        assert_eq!(monitor.tracked_count(), 1);
        drop(span);

        drop(cell);
        assert_eq!(monitor.tracked_count(), 0);
        let _ = object_id;
    }

    #[test]
    fn test_frozen_handle_never_conflicts() {
        let cell = tracked_cell();
        cell.freeze();

        let scope_a = ContextScope::enter();
        let _first = cell.enter("get").unwrap();
        drop(scope_a);

        let _scope_b = ContextScope::enter();
        let _second = cell.enter("get").unwrap();
    }
}
