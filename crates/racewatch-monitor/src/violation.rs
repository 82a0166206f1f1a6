//! # Violation Model
//!
//! A [`Violation`] is the monitor's one and only error: a conflicting guard
//! acquisition. It is created inside the guard table's acquire path, fully
//! attributed at creation, and never mutated afterwards. The monitor itself
//! never catches or retries a violation - it is the designed output, handed
//! to the caller like any other failure, or to a reporting sink under the
//! non-fatal diagnostic policy.

use crate::context::{ContextId, StackTrace};
use crate::table::GuardKey;
use serde::Serialize;
use thiserror::Error;

/// One side of a conflict: a context identity plus the stack it was on.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnapshot {
    /// The execution context's identity.
    pub context: ContextId,
    /// The call stack captured for attribution.
    pub stack: StackTrace,
}

impl ContextSnapshot {
    /// Creates a snapshot of a context and its captured stack.
    #[must_use]
    pub const fn new(context: ContextId, stack: StackTrace) -> Self {
        Self { context, stack }
    }
}

impl std::fmt::Display for ContextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.context.fmt(f)
    }
}

/// A detected concurrent-access conflict.
///
/// Raised synchronously on the requesting context, before the intercepted
/// method body executes, so a test runner can pinpoint both racing call
/// sites without reproduction.
///
/// The `Display` form is a one-line summary; [`report`](Self::report)
/// renders the full record including both captured stacks.
#[derive(Debug, Clone, Error, Serialize)]
#[error(
    "conflicting concurrent access: {type_name}::{method} under guard '{guard}' \
     is held by {holder} and was requested by {requester}"
)]
pub struct Violation {
    /// Type name of the object whose guard conflicted.
    pub type_name: String,
    /// The method whose entry triggered the conflict.
    pub method: String,
    /// The guard that conflicted (exclusive or named).
    pub guard: GuardKey,
    /// The context currently holding the guard.
    pub holder: ContextSnapshot,
    /// The context whose acquisition was rejected.
    pub requester: ContextSnapshot,
}

impl Violation {
    /// Creates a violation record.
    #[must_use]
    pub fn new(
        type_name: &str,
        method: &str,
        guard: GuardKey,
        holder: ContextSnapshot,
        requester: ContextSnapshot,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            method: method.to_string(),
            guard,
            holder,
            requester,
        }
    }

    /// Renders the full human-readable report, stacks included.
    #[must_use]
    pub fn report(&self) -> String {
        format!(
            "{self}\n\
             \n\
             holder ({holder}):\n{holder_stack}\n\
             \n\
             requester ({requester}):\n{requester_stack}\n",
            holder = self.holder,
            holder_stack = self.holder.stack,
            requester = self.requester,
            requester_stack = self.requester.stack,
        )
    }
}

/// Result alias for guard acquisition.
pub type Result<T> = std::result::Result<T, Violation>;
