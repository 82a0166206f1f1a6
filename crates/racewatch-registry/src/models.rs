//! # Core Data Models for the Classification Registry
//!
//! This module defines the vocabulary shared by the registry and the access
//! monitor: how a single `(type, method)` pair is classified, and how guard
//! names partition an object's access surface.
//!
//! ## Design Notes
//!
//! The types here are deliberately small and `Copy` where possible. A
//! classification lookup happens on *every* monitored call, so the answer
//! must be cheap to produce and cheap to hand around:
//!
//! - `Classification` forces callers to handle all three tracking modes.
//! - `GuardName` wraps a `&'static str` so resolvers stay allocation-free.
//! - `Resolution` is the resolver-facing variant of `Classification`,
//!   keeping user-supplied resolver functions independent of registry
//!   internals.

use serde::Serialize;
use std::fmt;

/// A named partition of a tracked object's access surface.
///
/// Two methods that resolve to the same `GuardName` share a conflict
/// domain: concurrent calls to them from different execution contexts are a
/// violation. Methods resolving to *different* guard names may overlap
/// freely.
///
/// Guard names are `&'static str` by design: classification must be pure
/// and fast, and resolvers returning interned names never allocate.
///
/// # Example
///
/// ```rust
/// use racewatch_registry::GuardName;
///
/// const READABLE: GuardName = GuardName::new("readable");
/// assert_eq!(READABLE.as_str(), "readable");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuardName(&'static str);

impl GuardName {
    /// Creates a guard name from a static string.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the underlying name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for GuardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for GuardName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// How a single `(type, method)` access is tracked.
///
/// # Variants
///
/// - `Skip`: the access is exempt; the monitor never touches the guard
///   table for it.
/// - `Exclusive`: the whole object is one guard; any overlapping access
///   from another context conflicts.
/// - `Guarded(name)`: the access holds the named partition only; accesses
///   under other names may overlap safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Never tracked.
    Skip,

    /// Whole-object single guard.
    Exclusive,

    /// Partitioned guard identified by name.
    Guarded(GuardName),
}

impl Classification {
    /// Returns true if the access is exempt from tracking.
    #[inline]
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Returns true if the access holds the whole-object guard.
    #[inline]
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive)
    }

    /// Returns the guard name for a partitioned access, if any.
    #[must_use]
    pub const fn guard_name(&self) -> Option<GuardName> {
        match self {
            Self::Guarded(name) => Some(*name),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Exclusive => f.write_str("exclusive"),
            Self::Guarded(name) => write!(f, "guarded({name})"),
        }
    }
}

/// The answer a `Guarded` policy's resolver returns for one method name.
///
/// This is the resolver-facing mirror of [`Classification`]: user code
/// writes resolvers in terms of `Resolution` and the registry maps the
/// result 1:1 onto a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The method is exempt from tracking.
    Skip,

    /// The method holds the whole-object guard.
    Exclusive,

    /// The method holds the named partition.
    Guard(GuardName),
}

impl From<bool> for Resolution {
    /// Boolean shorthand used by per-method tables: `true` means safe
    /// (skip), `false` means tracked (exclusive).
    fn from(safe: bool) -> Self {
        if safe {
            Self::Skip
        } else {
            Self::Exclusive
        }
    }
}
