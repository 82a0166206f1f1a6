//! # Racewatch Monitor
//!
//! Concurrent-access detection for tracked objects: the guard table, the
//! execution-context model, the violation record, and the access monitor
//! that ties them to the classification registry.
//!
//! ## What It Detects
//!
//! Two execution contexts (threads or cooperative tasks) touching the same
//! mutable object at overlapping times. Objects may move freely between
//! contexts over time - sequential hand-off is never a violation.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`AccessMonitor`] | Event processor: call/return → acquire/release |
//! | [`GuardTable`] | Weakly referenced object → guard-state map |
//! | [`Violation`] | The conflict record, fully attributed |
//! | [`ContextId`] | Execution-context identity (task or thread) |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use racewatch_monitor::{AccessMonitor, ContextScope, ObjectRef};
//! use racewatch_registry::ClassificationRegistry;
//!
//! struct Ledger;
//!
//! let registry = Arc::new(ClassificationRegistry::new());
//! registry.declare_safe::<Ledger>(false);
//!
//! let monitor = AccessMonitor::new(registry);
//! monitor.enable();
//!
//! let ledger = Arc::new(Ledger);
//! let object = ObjectRef::new(&ledger);
//!
//! // First context enters read() and has not returned...
//! let holder = ContextScope::enter();
//! monitor.on_call(&object, "read").unwrap();
//! drop(holder);
//!
//! // ...so a second context's overlapping call conflicts.
//! let _requester = ContextScope::enter();
//! let violation = monitor.on_call(&object, "read").unwrap_err();
//! assert_eq!(violation.method, "read");
//! ```
//!
//! ## Guarantees
//!
//! - The monitor observes and reports; it never blocks or serializes the
//!   code it watches.
//! - A failed acquisition leaves the guard table unmodified.
//! - Objects are referenced weakly; tracking never extends a lifetime.
//! - Outcomes are deterministic given arrival order at the table mutex.

mod context;
mod monitor;
mod table;
mod violation;

pub use context::{in_task_scope, in_task_scope_with, ContextId, ContextScope, StackTrace};
pub use monitor::{
    AccessMonitor, CollectingSink, LogSink, MonitorOptions, ViolationPolicy, ViolationSink,
};
pub use table::{GuardKey, GuardStateSnapshot, GuardTable, HolderSnapshot, ObjectId, ObjectRef};
pub use violation::{ContextSnapshot, Result, Violation};
