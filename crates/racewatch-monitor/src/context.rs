//! # Execution Context Identity
//!
//! The monitor compares accesses by *execution context*: the cooperative
//! task or OS thread issuing a call. Two overlapping accesses from the same
//! context are fine (re-entrancy); from different contexts they conflict.
//!
//! ## Identity Resolution
//!
//! [`ContextId::current`] resolves the active context in priority order:
//!
//! 1. A tokio task-local scope installed by [`in_task_scope`] - follows the
//!    task across `.await` points and worker-thread migration.
//! 2. An explicitly entered [`ContextScope`] on the current thread - for
//!    cooperative schedulers that are not tokio, and for tests.
//! 3. The thread's own identity, assigned lazily on first use.
//!
//! The monitor never creates or destroys contexts; it only records the
//! identity of whichever one is active at the call site.
//!
//! ## Stack Snapshots
//!
//! For attribution, the holder and requester of a conflicting guard each
//! carry a [`StackTrace`] captured at acquisition/conflict time. Capture is
//! expensive, so the monitor only captures for accesses that are actually
//! tracked, and can be told to skip capture entirely.

use serde::Serialize;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static TASK_CONTEXT: ContextId;
}

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ContextId>> = const { RefCell::new(Vec::new()) };
    static THREAD_CONTEXT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// Stable identity of one execution context (task or thread).
///
/// Compared for equality to decide whether two accesses are concurrent.
/// Identities are process-unique and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a fresh, never-before-used context identity.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the identity of the currently active execution context.
    ///
    /// See the module docs for the resolution order. The thread fallback
    /// assigns an identity on first use and keeps it for the thread's
    /// lifetime, so plain threaded code needs no setup at all.
    #[must_use]
    pub fn current() -> Self {
        if let Ok(id) = TASK_CONTEXT.try_with(|id| *id) {
            return id;
        }
        if let Some(id) = SCOPE_STACK.with(|stack| stack.borrow().last().copied()) {
            return id;
        }
        THREAD_CONTEXT.with(|slot| match slot.get() {
            Some(id) => id,
            None => {
                let id = Self::fresh();
                slot.set(Some(id));
                id
            }
        })
    }

    /// Returns the raw numeric identity.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context #{}", self.0)
    }
}

/// RAII scope installing a cooperative context identity on the current
/// thread.
///
/// Scopes nest: the innermost scope wins, and dropping it restores the
/// enclosing identity. The scope is thread-bound and intentionally not
/// `Send` - a cooperative context identity must not leak to another thread.
///
/// # Example
///
/// ```rust
/// use racewatch_monitor::{ContextId, ContextScope};
///
/// let outer = ContextId::current();
/// {
///     let scope = ContextScope::enter();
///     assert_eq!(ContextId::current(), scope.id());
///     assert_ne!(ContextId::current(), outer);
/// }
/// assert_eq!(ContextId::current(), outer);
/// ```
#[derive(Debug)]
pub struct ContextScope {
    id: ContextId,
    _not_send: PhantomData<*const ()>,
}

impl ContextScope {
    /// Enters a scope with a fresh context identity.
    #[must_use]
    pub fn enter() -> Self {
        Self::with(ContextId::fresh())
    }

    /// Enters a scope with a specific context identity.
    ///
    /// Useful when one logical context resumes across several scheduling
    /// slices and must keep its identity.
    #[must_use]
    pub fn with(id: ContextId) -> Self {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(id));
        Self {
            id,
            _not_send: PhantomData,
        }
    }

    /// Returns the identity installed by this scope.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.id), "misnested context scopes");
        });
    }
}

/// Runs a future inside a fresh task-scoped execution context.
///
/// The identity follows the future through `.await` points and across
/// worker threads, which thread-bound [`ContextScope`] cannot do. This is
/// the integration point for cooperative tokio workloads.
///
/// # Example
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use racewatch_monitor::{in_task_scope, ContextId};
///
/// let (a, b) = tokio::join!(
///     in_task_scope(async { ContextId::current() }),
///     in_task_scope(async { ContextId::current() }),
/// );
/// assert_ne!(a, b);
/// # }
/// ```
pub async fn in_task_scope<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    TASK_CONTEXT.scope(ContextId::fresh(), future).await
}

/// Runs a future inside a task-scoped context with a specific identity.
pub async fn in_task_scope_with<F>(id: ContextId, future: F) -> F::Output
where
    F: std::future::Future,
{
    TASK_CONTEXT.scope(id, future).await
}

/// A cheaply clonable call-stack snapshot, or a disabled placeholder.
///
/// Captured at guard acquisition (the eventual holder's stack) and reused
/// as the requester's stack when that same attempt conflicts instead.
#[derive(Clone)]
pub struct StackTrace(Option<Arc<Backtrace>>);

impl StackTrace {
    /// Captures the current call stack.
    ///
    /// Capture is forced regardless of `RUST_BACKTRACE`: when the monitor
    /// decides a stack is wanted, the environment must not veto it.
    #[must_use]
    pub fn capture() -> Self {
        Self(Some(Arc::new(Backtrace::force_capture())))
    }

    /// A placeholder used when stack capture is turned off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self(None)
    }

    /// Returns true if a stack was actually captured.
    #[inline]
    #[must_use]
    pub const fn is_captured(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(backtrace) => write!(f, "{backtrace}"),
            None => f.write_str("<stack capture disabled>"),
        }
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("StackTrace(captured)"),
            None => f.write_str("StackTrace(disabled)"),
        }
    }
}

impl Serialize for StackTrace {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
