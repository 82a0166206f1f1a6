//! # Access Monitor
//!
//! The event processor: receives method entry/exit events from the
//! interception boundary, consults the classification registry, and drives
//! guard acquisition and release, surfacing a [`Violation`] on conflict.
//!
//! ## Event Flow
//!
//! ```text
//!  interception boundary
//!         │ on_call / on_return
//!         ▼
//!  ┌──────────────┐   resolve    ┌────────────────────────┐
//!  │ AccessMonitor│ ───────────► │ ClassificationRegistry │
//!  └──────┬───────┘              └────────────────────────┘
//!         │ try_acquire / release
//!         ▼
//!  ┌──────────────┐   conflict   ┌───────────┐
//!  │  GuardTable  │ ───────────► │ Violation │──► raise / report
//!  └──────────────┘              └───────────┘
//! ```
//!
//! ## Guarantees
//!
//! - `on_call`/`on_return` execute synchronously on the calling context.
//!   The monitor never suspends, blocks, retries, or schedules work.
//! - Classification resolution and stack capture happen outside the table
//!   mutex; the instrumented method body runs entirely outside it too.
//! - The monitor observes and reports; it never serializes user code.

use crate::context::{ContextId, StackTrace};
use crate::table::{GuardKey, GuardStateSnapshot, GuardTable, ObjectId, ObjectRef};
use crate::violation::Violation;
use parking_lot::{Mutex, RwLock};
use racewatch_registry::{Classification, ClassificationRegistry};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives violations under the non-fatal diagnostic policy.
pub trait ViolationSink: Send + Sync {
    /// Called once per detected violation, on the requesting context.
    fn report(&self, violation: &Violation);
}

/// A sink that logs each violation through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ViolationSink for LogSink {
    fn report(&self, violation: &Violation) {
        warn!("{violation}");
    }
}

/// A sink that retains every violation, for assertions in long test runs.
#[derive(Debug, Default)]
pub struct CollectingSink {
    violations: Mutex<Vec<Violation>>,
}

impl CollectingSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of violations collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.lock().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }

    /// Drains and returns everything collected so far.
    #[must_use]
    pub fn take(&self) -> Vec<Violation> {
        std::mem::take(&mut *self.violations.lock())
    }
}

impl ViolationSink for CollectingSink {
    fn report(&self, violation: &Violation) {
        self.violations.lock().push(violation.clone());
    }
}

/// What happens when a conflict is detected.
#[derive(Clone, Default)]
pub enum ViolationPolicy {
    /// Return the violation to the caller as an error, before the
    /// intercepted method body executes.
    #[default]
    Raise,

    /// Hand the violation to a sink and let the call proceed as if no
    /// conflict existed - non-fatal observation for long test runs.
    Report(Arc<dyn ViolationSink>),
}

impl ViolationPolicy {
    /// Shorthand for reporting into a freshly shared sink.
    #[must_use]
    pub fn report_to(sink: Arc<dyn ViolationSink>) -> Self {
        Self::Report(sink)
    }
}

impl fmt::Debug for ViolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise => f.write_str("ViolationPolicy::Raise"),
            Self::Report(_) => f.write_str("ViolationPolicy::Report(<sink>)"),
        }
    }
}

/// Configuration for [`AccessMonitor`].
///
/// # Example
///
/// ```rust
/// use racewatch_monitor::{MonitorOptions, ViolationPolicy};
///
/// let options = MonitorOptions::new()
///     .with_stack_capture(false)
///     .with_sweep_threshold(256);
/// ```
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Diagnostic policy on conflict.
    pub violation_policy: ViolationPolicy,
    /// Capture holder/requester stacks for attribution.
    pub capture_stacks: bool,
    /// Table size at which dead entries are swept opportunistically.
    /// Zero disables the opportunistic sweep.
    pub sweep_threshold: usize,
}

impl MonitorOptions {
    /// Creates options with default values.
    ///
    /// Defaults:
    /// - Violation policy: raise
    /// - Stack capture: enabled
    /// - Sweep threshold: 1024 entries
    #[must_use]
    pub fn new() -> Self {
        Self {
            violation_policy: ViolationPolicy::Raise,
            capture_stacks: true,
            sweep_threshold: 1024,
        }
    }

    /// Sets the diagnostic policy.
    #[must_use]
    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation_policy = policy;
        self
    }

    /// Enables or disables stack capture.
    #[must_use]
    pub fn with_stack_capture(mut self, capture: bool) -> Self {
        self.capture_stacks = capture;
        self
    }

    /// Sets the opportunistic sweep threshold.
    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The concurrent-access monitor.
///
/// Correct under true parallelism: any number of contexts may deliver
/// events simultaneously. The monitor holds its one mutex only for the
/// guard table's lookup-and-mutate step.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use racewatch_monitor::{AccessMonitor, ObjectRef};
/// use racewatch_registry::ClassificationRegistry;
///
/// struct Counter;
///
/// let registry = Arc::new(ClassificationRegistry::new());
/// registry.declare_safe::<Counter>(false);
///
/// let monitor = AccessMonitor::new(Arc::clone(&registry));
/// monitor.enable();
///
/// let counter = Arc::new(Counter);
/// let object = ObjectRef::new(&counter);
///
/// monitor.on_call(&object, "bump").unwrap();
/// // ... the method body would run here ...
/// monitor.on_return(&object, "bump");
/// ```
pub struct AccessMonitor {
    registry: Arc<ClassificationRegistry>,
    table: GuardTable,
    policy: RwLock<ViolationPolicy>,
    capture_stacks: AtomicBool,
    enabled: AtomicBool,
}

impl AccessMonitor {
    /// Creates a disabled monitor with default options.
    #[must_use]
    pub fn new(registry: Arc<ClassificationRegistry>) -> Self {
        Self::with_options(registry, MonitorOptions::new())
    }

    /// Creates a disabled monitor with the given options.
    #[must_use]
    pub fn with_options(registry: Arc<ClassificationRegistry>, options: MonitorOptions) -> Self {
        Self {
            registry,
            table: GuardTable::new(options.sweep_threshold),
            policy: RwLock::new(options.violation_policy),
            capture_stacks: AtomicBool::new(options.capture_stacks),
            enabled: AtomicBool::new(false),
        }
    }

    /// Turns monitoring on. Idempotent: enabling an enabled monitor is a
    /// no-op. Returns true if the monitor transitioned from disabled.
    ///
    /// Monitoring always starts from a clean slate - no guard state
    /// survives a disable/enable cycle.
    pub fn enable(&self) -> bool {
        if self.enabled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.table.clear();
        info!("access monitoring enabled");
        true
    }

    /// Turns monitoring on with a specific diagnostic policy.
    ///
    /// The policy only takes effect when the monitor actually transitions
    /// from disabled to enabled; enabling twice keeps the first policy.
    pub fn enable_with(&self, policy: ViolationPolicy) -> bool {
        if self.enabled.load(Ordering::SeqCst) {
            debug!("enable requested while already enabled; keeping current policy");
            return false;
        }
        *self.policy.write() = policy;
        self.enable()
    }

    /// Turns monitoring off and discards all guard state unconditionally.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.table.clear();
        info!("access monitoring disabled; guard state discarded");
    }

    /// Returns true if monitoring is on.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Method-entry event.
    ///
    /// Resolves the classification for `(type, method)` and acquires the
    /// corresponding guard for the current execution context. On conflict,
    /// either returns the violation (policy `Raise`) or reports it to the
    /// sink and succeeds (policy `Report`).
    ///
    /// Exempt fast paths, in order: monitor disabled, object frozen, type
    /// wholly exempt, method classified `Skip`.
    pub fn on_call(&self, object: &ObjectRef, method: &str) -> Result<(), Violation> {
        if !self.is_enabled() || object.is_frozen() || self.registry.is_exempt(object.type_id()) {
            return Ok(());
        }

        // Resolution runs outside the table lock: a resolver touching
        // other tracked state must not re-enter the mutex.
        let key = match self.registry.resolve(object.type_id(), method) {
            Classification::Skip => return Ok(()),
            Classification::Exclusive => GuardKey::Exclusive,
            Classification::Guarded(name) => GuardKey::Named(name),
        };

        let context = ContextId::current();
        let stack = if self.capture_stacks.load(Ordering::Relaxed) {
            StackTrace::capture()
        } else {
            StackTrace::disabled()
        };

        match self.table.try_acquire(object, method, key, context, stack) {
            Ok(()) => Ok(()),
            Err(violation) => {
                let policy = self.policy.read().clone();
                match policy {
                    ViolationPolicy::Raise => {
                        warn!("{violation}");
                        Err(violation)
                    }
                    ViolationPolicy::Report(sink) => {
                        debug!("reported non-fatally: {violation}");
                        sink.report(&violation);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Method-exit event.
    ///
    /// Releases whatever guard the matching `on_call` acquired. Releases
    /// that do not match an acquisition - unknown object, different guard,
    /// different context - are silent no-ops: they indicate calls that
    /// predate enablement, not detector bugs.
    pub fn on_return(&self, object: &ObjectRef, method: &str) {
        if !self.is_enabled() || self.registry.is_exempt(object.type_id()) {
            return;
        }

        // No frozen check here: an object frozen mid-call still needs its
        // guard from the matching on_call released.
        let key = match self.registry.resolve(object.type_id(), method) {
            Classification::Skip => return,
            Classification::Exclusive => GuardKey::Exclusive,
            Classification::Guarded(name) => GuardKey::Named(name),
        };

        self.table.release(object, key, ContextId::current());
    }

    /// Legacy explicit ownership-transfer entry point. No-op.
    ///
    /// In the call/return model nothing is owned outside the span of an
    /// active call, so ownership is inherently transferable; this exists
    /// only so old call sites keep compiling.
    pub fn transfer_ownership(&self, object: &ObjectRef) {
        debug!(id = %object.id(), "transfer_ownership is a no-op");
    }

    /// Read-only snapshot of an object's guard state, for assertions.
    #[must_use]
    pub fn guard_state_of(&self, object: &ObjectRef) -> Option<GuardStateSnapshot> {
        self.table.snapshot(object.id())
    }

    /// Number of objects with open guards.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.table.len()
    }

    /// Drops guard state for an object whose handle was disposed.
    pub fn forget(&self, id: ObjectId) {
        self.table.forget(id);
    }

    /// Prunes entries for collected objects. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.table.sweep()
    }

    /// The classification registry this monitor consults.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClassificationRegistry> {
        &self.registry
    }
}

impl fmt::Debug for AccessMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessMonitor")
            .field("enabled", &self.is_enabled())
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextScope;

    struct Counter;
    struct Plain;

    fn monitor_for_counter() -> (AccessMonitor, Arc<Counter>, ObjectRef) {
        let registry = Arc::new(ClassificationRegistry::new());
        registry.declare_safe::<Counter>(false);

        let monitor = AccessMonitor::with_options(
            Arc::clone(&registry),
            MonitorOptions::new().with_stack_capture(false),
        );
        monitor.enable();

        let value = Arc::new(Counter);
        let object = ObjectRef::new(&value);
        (monitor, value, object)
    }

    #[test]
    fn test_disabled_monitor_ignores_events() {
        let registry = Arc::new(ClassificationRegistry::new());
        registry.declare_safe::<Counter>(false);
        let monitor = AccessMonitor::new(registry);

        let value = Arc::new(Counter);
        let object = ObjectRef::new(&value);

        monitor.on_call(&object, "bump").unwrap();
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[test]
    fn test_undeclared_type_never_tracked() {
        let registry = Arc::new(ClassificationRegistry::new());
        let monitor = AccessMonitor::new(registry);
        monitor.enable();

        let value = Arc::new(Plain);
        let object = ObjectRef::new(&value);

        monitor.on_call(&object, "poke").unwrap();
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[test]
    fn test_frozen_object_exempt_despite_classification() {
        let (monitor, _value, object) = monitor_for_counter();
        object.freeze();

        let _scope_a = ContextScope::enter();
        monitor.on_call(&object, "bump").unwrap();
        drop(_scope_a);

        // Never entered the guard table, so a second context overlaps freely.
        let _scope_b = ContextScope::enter();
        monitor.on_call(&object, "bump").unwrap();
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[test]
    fn test_call_return_cycle_tracks_and_clears() {
        let (monitor, _value, object) = monitor_for_counter();

        monitor.on_call(&object, "bump").unwrap();
        assert_eq!(monitor.tracked_count(), 1);

        monitor.on_return(&object, "bump");
        assert_eq!(monitor.tracked_count(), 0);
        assert!(monitor.guard_state_of(&object).is_none());
    }

    #[test]
    fn test_overlapping_contexts_conflict() {
        let (monitor, _value, object) = monitor_for_counter();

        let holder = {
            let scope = ContextScope::enter();
            monitor.on_call(&object, "read").unwrap();
            scope.id()
        };

        let scope = ContextScope::enter();
        let violation = monitor.on_call(&object, "value").unwrap_err();

        assert_eq!(violation.method, "value");
        assert_eq!(violation.holder.context, holder);
        assert_eq!(violation.requester.context, scope.id());
    }

    #[test]
    fn test_report_policy_continues_and_collects() {
        let registry = Arc::new(ClassificationRegistry::new());
        registry.declare_safe::<Counter>(false);

        let sink = Arc::new(CollectingSink::new());
        let monitor = AccessMonitor::with_options(
            registry,
            MonitorOptions::new()
                .with_stack_capture(false)
                .with_violation_policy(ViolationPolicy::Report(
                    Arc::clone(&sink) as Arc<dyn ViolationSink>
                )),
        );
        monitor.enable();

        let value = Arc::new(Counter);
        let object = ObjectRef::new(&value);

        {
            let _scope = ContextScope::enter();
            monitor.on_call(&object, "read").unwrap();
        }

        let _scope = ContextScope::enter();
        // Conflict is reported, not raised; the call proceeds.
        monitor.on_call(&object, "read").unwrap();

        let collected = sink.take();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].method, "read");
    }

    #[test]
    fn test_enable_is_idempotent() {
        let registry = Arc::new(ClassificationRegistry::new());
        let monitor = AccessMonitor::new(registry);

        assert!(monitor.enable());
        assert!(!monitor.enable());
        assert!(!monitor.enable_with(ViolationPolicy::Raise));
    }

    #[test]
    fn test_disable_clears_all_state() {
        let (monitor, _value, object) = monitor_for_counter();

        {
            let _scope = ContextScope::enter();
            monitor.on_call(&object, "read").unwrap();
        }
        assert_eq!(monitor.tracked_count(), 1);

        monitor.disable();
        assert_eq!(monitor.tracked_count(), 0);

        // Re-enable starts clean: the pre-disable holder is gone, so a new
        // context's first access succeeds.
        monitor.enable();
        let _scope = ContextScope::enter();
        monitor.on_call(&object, "read").unwrap();
    }

    #[test]
    fn test_transfer_ownership_is_noop() {
        let (monitor, _value, object) = monitor_for_counter();

        monitor.on_call(&object, "read").unwrap();
        let before = monitor.guard_state_of(&object);

        monitor.transfer_ownership(&object);
        assert_eq!(monitor.guard_state_of(&object), before);
    }

    #[test]
    fn test_forget_on_disposal() {
        let (monitor, _value, object) = monitor_for_counter();

        monitor.on_call(&object, "read").unwrap();
        monitor.forget(object.id());
        assert_eq!(monitor.tracked_count(), 0);
    }
}
