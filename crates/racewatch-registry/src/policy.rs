//! # Classification Policies
//!
//! A policy describes how *all* methods of one type are tracked. Policies
//! are attached to a type once, at declaration time, and are immutable for
//! the lifetime of the registry.
//!
//! ## Policy Forms
//!
//! | Policy | Meaning |
//! |--------|---------|
//! | `AlwaysSafe` | Every method is exempt (skip) |
//! | `NeverSafe` | Every method holds the whole-object guard |
//! | `PerMethod` | Listed methods are safe/tracked per the map; unlisted methods are tracked |
//! | `Guarded` | A resolver function maps each method to skip, exclusive, or a named guard |
//!
//! The conservative defaults matter: once a type declares *any* policy,
//! methods it does not explicitly mark safe are tracked exclusively. A type
//! with *no* declared policy is assumed safe (see
//! [`ClassificationRegistry::resolve`](crate::ClassificationRegistry::resolve)).

use crate::models::{Classification, Resolution};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A resolver function for `Guarded` policies.
///
/// Called with the method name on every tracked access of the type, so it
/// must be pure, fast, and must never call back into monitored code.
pub type GuardResolver = Arc<dyn Fn(&str) -> Resolution + Send + Sync>;

/// The per-type classification policy.
#[derive(Clone)]
pub enum Policy {
    /// Every method is exempt.
    AlwaysSafe,

    /// Every method holds the whole-object guard.
    NeverSafe,

    /// Explicit per-method map: `true` = safe (skip), `false` = tracked
    /// (exclusive). Methods absent from the map are tracked.
    PerMethod(HashMap<String, bool>),

    /// Method-to-guard resolver for partitioned tracking.
    Guarded(GuardResolver),
}

impl Policy {
    /// Builds a `PerMethod` policy from `(method, safe)` pairs.
    pub fn per_method<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self::PerMethod(
            methods
                .into_iter()
                .map(|(name, safe)| (name.into(), safe))
                .collect(),
        )
    }

    /// Builds a `Guarded` policy from a resolver function.
    pub fn guarded<F>(resolver: F) -> Self
    where
        F: Fn(&str) -> Resolution + Send + Sync + 'static,
    {
        Self::Guarded(Arc::new(resolver))
    }

    /// Resolves the classification for one method under this policy.
    #[must_use]
    pub fn classify(&self, method: &str) -> Classification {
        match self {
            Self::AlwaysSafe => Classification::Skip,
            Self::NeverSafe => Classification::Exclusive,
            Self::PerMethod(map) => match map.get(method) {
                Some(true) => Classification::Skip,
                // Unlisted methods default to tracked once a policy exists.
                Some(false) | None => Classification::Exclusive,
            },
            Self::Guarded(resolver) => match resolver(method) {
                Resolution::Skip => Classification::Skip,
                Resolution::Exclusive => Classification::Exclusive,
                Resolution::Guard(name) => Classification::Guarded(name),
            },
        }
    }

    /// Returns true if this policy exempts the whole type, independent of
    /// any method name.
    ///
    /// `PerMethod` and `Guarded` policies are never wholly exempt even when
    /// every listed method happens to be safe: unlisted methods remain
    /// tracked.
    #[inline]
    #[must_use]
    pub fn is_wholly_exempt(&self) -> bool {
        matches!(self, Self::AlwaysSafe)
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysSafe => f.write_str("Policy::AlwaysSafe"),
            Self::NeverSafe => f.write_str("Policy::NeverSafe"),
            Self::PerMethod(map) => f.debug_tuple("Policy::PerMethod").field(map).finish(),
            Self::Guarded(_) => f.write_str("Policy::Guarded(<resolver>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GuardName;

    #[test]
    fn test_always_safe_skips_everything() {
        let policy = Policy::AlwaysSafe;
        assert_eq!(policy.classify("read"), Classification::Skip);
        assert_eq!(policy.classify("write"), Classification::Skip);
        assert!(policy.is_wholly_exempt());
    }

    #[test]
    fn test_never_safe_tracks_everything() {
        let policy = Policy::NeverSafe;
        assert_eq!(policy.classify("read"), Classification::Exclusive);
        assert_eq!(policy.classify("anything"), Classification::Exclusive);
        assert!(!policy.is_wholly_exempt());
    }

    #[test]
    fn test_per_method_listed_and_unlisted() {
        let policy = Policy::per_method([("len", true), ("push", false)]);

        assert_eq!(policy.classify("len"), Classification::Skip);
        assert_eq!(policy.classify("push"), Classification::Exclusive);
        // Absent methods default to tracked.
        assert_eq!(policy.classify("pop"), Classification::Exclusive);
        assert!(!policy.is_wholly_exempt());
    }

    #[test]
    fn test_guarded_resolver_mapping() {
        const READABLE: GuardName = GuardName::new("readable");
        const WRITABLE: GuardName = GuardName::new("writable");

        let policy = Policy::guarded(|method| match method {
            "read" | "peek" => Resolution::Guard(READABLE),
            "write" => Resolution::Guard(WRITABLE),
            "len" => Resolution::Skip,
            _ => Resolution::Exclusive,
        });

        assert_eq!(policy.classify("read"), Classification::Guarded(READABLE));
        assert_eq!(policy.classify("peek"), Classification::Guarded(READABLE));
        assert_eq!(policy.classify("write"), Classification::Guarded(WRITABLE));
        assert_eq!(policy.classify("len"), Classification::Skip);
        assert_eq!(policy.classify("clear"), Classification::Exclusive);
    }

    #[test]
    fn test_guarded_resolver_boolean_shorthand() {
        let policy = Policy::guarded(|method| Resolution::from(method == "len"));
        assert_eq!(policy.classify("len"), Classification::Skip);
        assert_eq!(policy.classify("push"), Classification::Exclusive);
    }
}
