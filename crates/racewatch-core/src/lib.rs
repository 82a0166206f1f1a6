//! # Racewatch Core
//!
//! Unified facade for the racewatch runtime concurrency monitor: detects
//! conflicting concurrent access to tracked objects across execution
//! contexts, while letting objects hand off between contexts freely over
//! time.
//!
//! ## What It Is (and Is Not)
//!
//! Racewatch is a development and testing instrument. It observes
//! method-scoped accesses and reports conflicts with full attribution -
//! both contexts' identities and captured stacks. It never provides mutual
//! exclusion: user code is not blocked, serialized, or retried.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        RACEWATCH CORE                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌─────────────────┐                          │
//! │                    │    Racewatch    │  ← Unified Facade        │
//! │                    └────────┬────────┘                          │
//! │                             │                                   │
//! │         ┌───────────────────┼───────────────────┐               │
//! │         ▼                   ▼                   ▼               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ Classifica- │    │   Access    │    │  Tracked    │          │
//! │  │tion Registry│    │   Monitor   │    │  Handles    │          │
//! │  └─────────────┘    └─────────────┘    └─────────────┘          │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use racewatch_core::{Racewatch, RacewatchConfig};
//!
//! struct Ledger;
//!
//! let watch = Racewatch::new(RacewatchConfig::default());
//! watch.declare_safe::<Ledger>(false); // every method tracked exclusively
//! watch.enable();
//!
//! let ledger = watch.track(Ledger);
//!
//! // Each method-scoped access opens a span; overlapping spans from
//! // different contexts produce a Violation.
//! match ledger.enter("read") {
//!     Ok(span) => { /* access *span here */ }
//!     Err(violation) => eprintln!("{}", violation.report()),
//! };
//! ```
//!
//! ## Detection Model
//!
//! - Method entry acquires a guard; method return releases it.
//! - Guards are whole-object (exclusive) or named partitions (guarded).
//! - Same-context re-entry nests to any depth; cross-context overlap on
//!   the same guard is a [`Violation`].
//! - Frozen objects and skip-classified types are never tracked.
//! - A disable/enable cycle discards all accumulated guard state.

mod config;
mod error;
mod tracked;
mod watch;

pub use config::{DiagnosticsConfig, RacewatchConfig, TrackingConfig};
pub use error::{CoreError, Result};
pub use tracked::{AccessSpan, Tracked};
pub use watch::Racewatch;

// Re-export component types for convenience
pub use racewatch_monitor::{
    in_task_scope, in_task_scope_with, AccessMonitor, CollectingSink, ContextId, ContextScope,
    ContextSnapshot, GuardKey, GuardStateSnapshot, HolderSnapshot, LogSink, MonitorOptions,
    ObjectId, ObjectRef, StackTrace, Violation, ViolationPolicy, ViolationSink,
};
pub use racewatch_registry::{
    Classification, ClassificationRegistry, GuardName, GuardResolver, Policy, Resolution,
};
