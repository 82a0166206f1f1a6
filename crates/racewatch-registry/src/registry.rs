//! # Classification Registry - Main Facade
//!
//! The registry maps type identities to [`Policy`] values and answers, for
//! every monitored call, how the `(type, method)` pair is tracked.
//!
//! ## Design
//!
//! Built-in container types cannot be reopened to carry policy metadata in
//! Rust, so the registry is a static table keyed by `TypeId`, populated at
//! startup by whoever owns the types being monitored. Resolution is a read
//! lock plus a map lookup plus a match; it allocates nothing and never
//! calls back into monitored code.
//!
//! ## Defaults
//!
//! | Situation | Answer |
//! |-----------|--------|
//! | Type has no declared policy | `Skip` (assume safety unless told otherwise) |
//! | `PerMethod`, method marked safe | `Skip` |
//! | `PerMethod`, method marked unsafe or unlisted | `Exclusive` |
//! | `Guarded`, per the resolver | `Skip` / `Exclusive` / `Guarded(name)` |
//!
//! ## Concurrency
//!
//! Declarations happen at startup; resolutions happen on every event from
//! any context. The policy map sits behind a `parking_lot::RwLock`, so
//! concurrent resolution never contends with itself.

use crate::models::{Classification, Resolution};
use crate::policy::Policy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use tracing::warn;

/// The classification registry.
///
/// Policies are registered once per type and immutable thereafter: the
/// first declaration for a type wins and later declarations are ignored
/// (with a warning), so a monitored run cannot change its own rules
/// mid-flight.
///
/// # Example
///
/// ```rust
/// use racewatch_registry::{ClassificationRegistry, Classification, GuardName, Resolution};
///
/// struct Ledger;
///
/// let registry = ClassificationRegistry::new();
/// registry.declare_guarded::<Ledger, _>(|method| match method {
///     "read" | "peek" => Resolution::Guard(GuardName::new("readable")),
///     "write" => Resolution::Guard(GuardName::new("writable")),
///     _ => Resolution::Exclusive,
/// });
///
/// assert_eq!(
///     registry.resolve_for::<Ledger>("peek"),
///     Classification::Guarded(GuardName::new("readable")),
/// );
/// ```
#[derive(Debug, Default)]
pub struct ClassificationRegistry {
    policies: RwLock<HashMap<TypeId, Policy>>,
}

impl ClassificationRegistry {
    /// Creates an empty registry.
    ///
    /// Every type starts undeclared, which means exempt: the monitor
    /// assumes safety unless told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a policy for a type identified by `TypeId`.
    ///
    /// The first declaration for a type wins. Re-declaring a type is
    /// ignored and logged, never an error: startup tables and test setup
    /// may both try to describe the same primitive.
    pub fn declare(&self, type_id: TypeId, type_name: &str, policy: Policy) {
        let mut policies = self.policies.write();
        if policies.contains_key(&type_id) {
            warn!(type_name, "ignoring duplicate classification policy");
            return;
        }
        policies.insert(type_id, policy);
    }

    /// Declares a type wholly safe (`true`) or wholly tracked (`false`).
    pub fn declare_safe<T: 'static>(&self, safe: bool) {
        let policy = if safe {
            Policy::AlwaysSafe
        } else {
            Policy::NeverSafe
        };
        self.declare(TypeId::of::<T>(), std::any::type_name::<T>(), policy);
    }

    /// Declares a per-method policy: `true` = safe, `false` = tracked.
    /// Methods absent from the map are tracked.
    pub fn declare_methods<T, I, S>(&self, methods: I)
    where
        T: 'static,
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        self.declare(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            Policy::per_method(methods),
        );
    }

    /// Declares a guarded policy with a method resolver.
    pub fn declare_guarded<T, F>(&self, resolver: F)
    where
        T: 'static,
        F: Fn(&str) -> Resolution + Send + Sync + 'static,
    {
        self.declare(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            Policy::guarded(resolver),
        );
    }

    /// Resolves the classification for one `(type, method)` pair.
    ///
    /// Types with no declared policy resolve to `Skip`.
    #[must_use]
    pub fn resolve(&self, type_id: TypeId, method: &str) -> Classification {
        match self.policies.read().get(&type_id) {
            Some(policy) => policy.classify(method),
            None => Classification::Skip,
        }
    }

    /// Generic convenience for [`resolve`](Self::resolve).
    #[must_use]
    pub fn resolve_for<T: 'static>(&self, method: &str) -> Classification {
        self.resolve(TypeId::of::<T>(), method)
    }

    /// Returns true if the whole type is exempt regardless of method.
    ///
    /// Used by the monitor's fast path: an object whose type is wholly
    /// exempt is never entered into the guard table.
    #[must_use]
    pub fn is_exempt(&self, type_id: TypeId) -> bool {
        match self.policies.read().get(&type_id) {
            Some(policy) => policy.is_wholly_exempt(),
            None => true,
        }
    }

    /// Returns the number of declared policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    /// Returns true if no policies are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}
