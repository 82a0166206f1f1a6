//! # Racewatch Classification Registry
//!
//! Declarative per-type access-tracking policies for the racewatch
//! concurrency monitor.
//!
//! The registry answers one question on every monitored call: for this type
//! and this method, is the access exempt, does it hold the whole-object
//! guard, or does it hold a named partition of the object's access surface?
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`ClassificationRegistry`] | `TypeId` → policy table, resolution facade |
//! | [`Policy`] | Per-type tracking policy (4 forms) |
//! | [`Classification`] | The resolved answer for one `(type, method)` pair |
//! | [`GuardName`] | Named partition of an object's access surface |
//!
//! ## Quick Start
//!
//! ```rust
//! use racewatch_registry::{ClassificationRegistry, Classification, GuardName, Resolution};
//!
//! struct RingBuffer;
//!
//! let registry = ClassificationRegistry::new();
//!
//! // read/peek share one conflict domain, write has its own.
//! registry.declare_guarded::<RingBuffer, _>(|method| match method {
//!     "read" | "peek" => Resolution::Guard(GuardName::new("readable")),
//!     "write" => Resolution::Guard(GuardName::new("writable")),
//!     _ => Resolution::Exclusive,
//! });
//!
//! assert_eq!(
//!     registry.resolve_for::<RingBuffer>("write"),
//!     Classification::Guarded(GuardName::new("writable")),
//! );
//! ```
//!
//! ## Resolution Contract
//!
//! - Undeclared types resolve to `Skip` for every method.
//! - Once any policy is declared, unlisted methods are tracked exclusively.
//! - Resolution is pure and cheap: a read lock, a map lookup, a match. It
//!   must never perform the operation being guarded.

mod models;
mod policy;
mod registry;

pub use models::{Classification, GuardName, Resolution};
pub use policy::{GuardResolver, Policy};
pub use registry::ClassificationRegistry;
