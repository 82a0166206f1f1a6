//! The unified racewatch facade.
//!
//! [`Racewatch`] wires the classification registry and the access monitor
//! together and exposes the whole control surface: lifecycle, policy
//! declaration, tracking, and the read-only query surface used by tests.

use crate::config::RacewatchConfig;
use crate::tracked::Tracked;

use racewatch_monitor::{
    AccessMonitor, GuardStateSnapshot, LogSink, MonitorOptions, ViolationPolicy,
};
use racewatch_registry::{Classification, ClassificationRegistry, Resolution};

use std::sync::Arc;
use tracing::debug;

/// The process-wide concurrency monitor facade.
///
/// # Lifecycle
///
/// A `Racewatch` starts disabled: tracking costs nothing until
/// [`enable`](Self::enable) is called. Disabling discards all guard state
/// unconditionally; re-enabling starts from a clean slate.
///
/// # Example
///
/// ```rust
/// use racewatch_core::{Racewatch, RacewatchConfig};
///
/// struct Inventory;
///
/// let watch = Racewatch::new(RacewatchConfig::default());
/// watch.declare_safe::<Inventory>(false);
/// watch.enable();
///
/// let inventory = watch.track(Inventory);
/// let span = inventory.enter("restock").unwrap();
/// // ... method body ...
/// drop(span);
/// ```
pub struct Racewatch {
    /// Configuration.
    config: RacewatchConfig,

    /// Classification registry: per-type tracking policies.
    registry: Arc<ClassificationRegistry>,

    /// Access monitor: guard table + event processing.
    monitor: Arc<AccessMonitor>,
}

impl Racewatch {
    /// Creates a disabled monitor facade from configuration.
    #[must_use]
    pub fn new(config: RacewatchConfig) -> Self {
        let registry = Arc::new(ClassificationRegistry::new());

        let policy = if config.diagnostics.report_only {
            ViolationPolicy::Report(Arc::new(LogSink))
        } else {
            ViolationPolicy::Raise
        };
        let options = MonitorOptions::new()
            .with_violation_policy(policy)
            .with_stack_capture(config.tracking.capture_stacks)
            .with_sweep_threshold(config.tracking.sweep_threshold);

        let monitor = Arc::new(AccessMonitor::with_options(Arc::clone(&registry), options));

        debug!(
            capture_stacks = config.tracking.capture_stacks,
            report_only = config.diagnostics.report_only,
            "racewatch initialized"
        );

        Self {
            config,
            registry,
            monitor,
        }
    }

    /// Turns monitoring on. Idempotent; returns true if the monitor
    /// transitioned from disabled.
    pub fn enable(&self) -> bool {
        self.monitor.enable()
    }

    /// Turns monitoring on with an explicit diagnostic policy, overriding
    /// the configured one. Idempotent: if already enabled, the running
    /// policy is kept and this is a no-op.
    pub fn enable_with(&self, policy: ViolationPolicy) -> bool {
        self.monitor.enable_with(policy)
    }

    /// Turns monitoring off and clears all tracked state.
    pub fn disable(&self) {
        self.monitor.disable();
    }

    /// Returns true if monitoring is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.monitor.is_enabled()
    }

    /// Places a value under monitoring and returns its owning handle.
    ///
    /// The monitor references the value weakly; the handle owns it.
    pub fn track<T: Send + Sync + 'static>(&self, value: T) -> Tracked<T> {
        Tracked::new(Arc::clone(&self.monitor), value)
    }

    /// Declares a type wholly safe (`true`) or wholly tracked (`false`).
    pub fn declare_safe<T: 'static>(&self, safe: bool) {
        self.registry.declare_safe::<T>(safe);
    }

    /// Declares a per-method policy: `true` = safe, `false` = tracked;
    /// unlisted methods are tracked.
    pub fn declare_methods<T, I, S>(&self, methods: I)
    where
        T: 'static,
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        self.registry.declare_methods::<T, I, S>(methods);
    }

    /// Declares a guarded policy with a method resolver.
    pub fn declare_guarded<T, F>(&self, resolver: F)
    where
        T: 'static,
        F: Fn(&str) -> Resolution + Send + Sync + 'static,
    {
        self.registry.declare_guarded::<T, F>(resolver);
    }

    /// Resolves the classification for a type and method.
    #[must_use]
    pub fn classification_of<T: 'static>(&self, method: &str) -> Classification {
        self.registry.resolve_for::<T>(method)
    }

    /// Read-only snapshot of a tracked object's guard state.
    #[must_use]
    pub fn guard_state_of<T: Send + Sync + 'static>(
        &self,
        tracked: &Tracked<T>,
    ) -> Option<GuardStateSnapshot> {
        self.monitor.guard_state_of(tracked.object_ref())
    }

    /// Legacy explicit ownership-transfer entry point. No-op: in the
    /// call/return model nothing is owned outside the span of an active
    /// call, so there is nothing to transfer.
    pub fn transfer_ownership<T: Send + Sync + 'static>(&self, tracked: &Tracked<T>) {
        self.monitor.transfer_ownership(tracked.object_ref());
    }

    /// The underlying access monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<AccessMonitor> {
        &self.monitor
    }

    /// The underlying classification registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClassificationRegistry> {
        &self.registry
    }

    /// The configuration this facade was built with.
    #[must_use]
    pub fn config(&self) -> &RacewatchConfig {
        &self.config
    }
}

impl Default for Racewatch {
    fn default() -> Self {
        Self::new(RacewatchConfig::default())
    }
}

impl std::fmt::Debug for Racewatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Racewatch")
            .field("enabled", &self.is_enabled())
            .field("policies", &self.registry.len())
            .field("tracked", &self.monitor.tracked_count())
            .finish()
    }
}
