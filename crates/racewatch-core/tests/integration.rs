//! # Integration Tests
//!
//! End-to-end tests for the racewatch facade: lifecycle, tracking,
//! diagnostics policy, and the query surface.

use racewatch_core::{
    Classification, CollectingSink, ContextScope, GuardName, GuardStateSnapshot, Racewatch,
    RacewatchConfig, Resolution, ViolationPolicy, ViolationSink,
};
use std::sync::Arc;

struct Account;
struct Journal;

fn quiet_config() -> RacewatchConfig {
    let mut config = RacewatchConfig::default();
    config.tracking.capture_stacks = false;
    config
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_enable_disable_lifecycle() {
    let watch = Racewatch::new(quiet_config());
    assert!(!watch.is_enabled());

    assert!(watch.enable());
    assert!(watch.is_enabled());
    assert!(!watch.enable()); // Idempotent.

    watch.disable();
    assert!(!watch.is_enabled());
    assert!(watch.enable()); // Transition again.
}

#[test]
fn test_tracking_costs_nothing_while_disabled() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_safe::<Account>(false);

    let account = watch.track(Account);

    // Disabled: spans open and close without touching the guard table.
    let _scope_a = ContextScope::enter();
    let span = account.enter("read").unwrap();
    assert_eq!(watch.monitor().tracked_count(), 0);
    drop(span);
    drop(_scope_a);

    let _scope_b = ContextScope::enter();
    account.enter("read").unwrap();
}

#[test]
fn test_disable_forgives_held_conflicts() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_safe::<Account>(false);
    watch.enable();

    let account = watch.track(Account);

    // Hold a guard from one context and never release it.
    let scope = ContextScope::enter();
    let span = account.enter("read").unwrap();
    std::mem::forget(span);
    drop(scope);

    // A second context would conflict right now.
    {
        let _rival = ContextScope::enter();
        account.enter("read").unwrap_err();
    }

    watch.disable();
    watch.enable();

    // After the cycle the old holder is gone entirely.
    let _rival = ContextScope::enter();
    account.enter("read").unwrap();
}

// ============================================================================
// Diagnostics Policy
// ============================================================================

#[test]
fn test_report_policy_hands_violations_to_sink() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_safe::<Account>(false);

    let sink = Arc::new(CollectingSink::new());
    watch.enable_with(ViolationPolicy::Report(
        Arc::clone(&sink) as Arc<dyn ViolationSink>
    ));

    let account = watch.track(Account);

    {
        let _holder = ContextScope::enter();
        let span = account.enter("read").unwrap();
        std::mem::forget(span);
    }

    // The conflicting call proceeds as if no conflict existed.
    let _rival = ContextScope::enter();
    let span = account.enter("value").unwrap();
    drop(span);

    let collected = sink.take();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].method, "value");
    assert_eq!(collected[0].type_name, std::any::type_name::<Account>());
}

#[test]
fn test_enable_with_after_enable_keeps_first_policy() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_safe::<Account>(false);
    watch.enable();

    let sink = Arc::new(CollectingSink::new());
    // Already enabled: the report policy must NOT take effect.
    assert!(!watch.enable_with(ViolationPolicy::Report(
        Arc::clone(&sink) as Arc<dyn ViolationSink>
    )));

    let account = watch.track(Account);
    {
        let _holder = ContextScope::enter();
        let span = account.enter("read").unwrap();
        std::mem::forget(span);
    }

    let _rival = ContextScope::enter();
    account.enter("read").unwrap_err(); // Still raising.
    assert!(sink.is_empty());
}

// ============================================================================
// Query Surface
// ============================================================================

#[test]
fn test_classification_queries() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_methods::<Account, _, _>([("balance", true), ("withdraw", false)]);
    watch.declare_guarded::<Journal, _>(|method| match method {
        "append" => Resolution::Guard(GuardName::new("tail")),
        _ => Resolution::Skip,
    });

    assert_eq!(
        watch.classification_of::<Account>("balance"),
        Classification::Skip
    );
    assert_eq!(
        watch.classification_of::<Account>("withdraw"),
        Classification::Exclusive
    );
    assert_eq!(
        watch.classification_of::<Account>("transfer"),
        Classification::Exclusive
    );
    assert_eq!(
        watch.classification_of::<Journal>("append"),
        Classification::Guarded(GuardName::new("tail"))
    );
}

#[test]
fn test_guard_state_snapshots() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_guarded::<Journal, _>(|method| match method {
        "read" => Resolution::Guard(GuardName::new("readable")),
        "write" => Resolution::Guard(GuardName::new("writable")),
        _ => Resolution::Exclusive,
    });
    watch.enable();

    let journal = watch.track(Journal);

    let read_span = journal.enter("read").unwrap();
    let write_span = journal.enter("write").unwrap();

    match watch.guard_state_of(&journal) {
        Some(GuardStateSnapshot::Partitioned(guards)) => {
            assert_eq!(guards.len(), 2);
            // Same context holds both partitions - that is fine.
            assert_eq!(guards[0].1.context, guards[1].1.context);
        }
        other => panic!("expected partitioned state, got {other:?}"),
    }

    drop(read_span);
    drop(write_span);
    assert!(watch.guard_state_of(&journal).is_none());
}

#[test]
fn test_reentrancy_depth_is_visible() {
    let watch = Racewatch::new(quiet_config());
    watch.declare_safe::<Account>(false);
    watch.enable();

    let account = watch.track(Account);

    let outer = account.enter("read").unwrap();
    let middle = account.enter("read").unwrap();
    let inner = account.enter("read").unwrap();

    match watch.guard_state_of(&account) {
        Some(GuardStateSnapshot::Exclusive(holder)) => assert_eq!(holder.depth, 3),
        other => panic!("expected exclusive state, got {other:?}"),
    }

    drop(inner);
    drop(middle);
    drop(outer);
    assert!(watch.guard_state_of(&account).is_none());
}

// ============================================================================
// Cooperative Tasks Through the Facade
// ============================================================================

#[tokio::test(flavor = "current_thread")]
async fn test_cooperative_conflict_through_facade() {
    use racewatch_core::in_task_scope;

    let watch = Arc::new(Racewatch::new(quiet_config()));
    watch.declare_safe::<Account>(false);
    watch.enable();

    let account = watch.track(Account);

    let acquired = Arc::new(tokio::sync::Notify::new());
    let checked = Arc::new(tokio::sync::Notify::new());

    let holder = {
        let account = account.clone();
        let acquired = Arc::clone(&acquired);
        let checked = Arc::clone(&checked);
        in_task_scope(async move {
            let span = account.enter("read").unwrap();
            acquired.notify_one();
            checked.notified().await;
            drop(span);
        })
    };

    let requester = {
        let account = account.clone();
        let acquired = Arc::clone(&acquired);
        let checked = Arc::clone(&checked);
        in_task_scope(async move {
            acquired.notified().await;
            let violation = account.enter("read").unwrap_err();
            checked.notify_one();
            violation
        })
    };

    let ((), violation) = tokio::join!(holder, requester);
    assert_eq!(violation.method, "read");
    assert_ne!(violation.holder.context, violation.requester.context);
    assert!(watch.guard_state_of(&account).is_none());
}
