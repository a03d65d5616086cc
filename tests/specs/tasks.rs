//! Task graph invariants (spec §8 scenario C; invariants 2, 3).

use gobby_core::{DepType, GobbyError, TaskDependency, TaskStatus, TaskType};

use crate::support::{Harness, PROJECT_ID};

/// Scenario C: a `blocks` edge that would create a cycle is rejected and
/// the graph is left exactly as it was before the attempt.
#[test]
fn blocks_cycle_is_rejected() {
    let harness = Harness::new();
    let a = harness.tasks.create(PROJECT_ID, "a", TaskType::Task, 2).expect("create a");
    let b = harness.tasks.create(PROJECT_ID, "b", TaskType::Task, 2).expect("create b");

    harness
        .tasks
        .add_dependency(TaskDependency { from: a.id.clone(), to: b.id.clone(), dep_type: DepType::Blocks })
        .expect("a blocks b");

    let err = harness
        .tasks
        .add_dependency(TaskDependency { from: b.id.clone(), to: a.id.clone(), dep_type: DepType::Blocks })
        .expect_err("b blocking a would close a cycle");
    assert!(matches!(err, GobbyError::InvalidInput { .. }), "cycle rejection should be InvalidInput: {err:?}");

    // b is still blocked by a — the rejected edge left no trace.
    let ready = harness.tasks.list_ready(PROJECT_ID);
    assert!(ready.iter().any(|t| t.id == a.id));
    assert!(!ready.iter().any(|t| t.id == b.id));
}

/// A task can't block itself.
#[test]
fn self_edge_is_rejected() {
    let harness = Harness::new();
    let a = harness.tasks.create(PROJECT_ID, "a", TaskType::Task, 2).expect("create a");

    let err = harness
        .tasks
        .add_dependency(TaskDependency { from: a.id.clone(), to: a.id.clone(), dep_type: DepType::Blocks })
        .expect_err("self-edge must be rejected");
    assert!(matches!(err, GobbyError::InvalidInput { .. }));
}

/// A blocked task drops out of `list_ready`; closing the blocker frees it.
#[test]
fn blocked_task_becomes_ready_once_blocker_closes() {
    let harness = Harness::new();
    let a = harness.tasks.create(PROJECT_ID, "a", TaskType::Task, 2).expect("create a");
    let b = harness.tasks.create(PROJECT_ID, "b", TaskType::Task, 2).expect("create b");
    harness
        .tasks
        .add_dependency(TaskDependency { from: a.id.clone(), to: b.id.clone(), dep_type: DepType::Blocks })
        .expect("a blocks b");

    let ready = harness.tasks.list_ready(PROJECT_ID);
    assert!(!ready.iter().any(|t| t.id == b.id), "b is blocked by open a");

    harness.tasks.transition(a.id.as_str(), TaskStatus::InProgress, false).expect("a -> in_progress");
    harness.tasks.transition(a.id.as_str(), TaskStatus::Closed, false).expect("a -> closed");

    let ready = harness.tasks.list_ready(PROJECT_ID);
    assert!(ready.iter().any(|t| t.id == b.id), "b is ready once a closes");
}

/// Invariant 2: a task can't skip straight from `open` to `closed` without
/// `skip_validation`, but can transition through `in_progress` normally.
#[test]
fn status_transitions_enforce_invariant() {
    let harness = Harness::new();
    let task = harness.tasks.create(PROJECT_ID, "t", TaskType::Task, 2).expect("create");
    assert_eq!(task.status, TaskStatus::Open);

    let err = harness.tasks.transition(task.id.as_str(), TaskStatus::Closed, false).expect_err("open -> closed without skip_validation is invalid");
    assert!(matches!(err, GobbyError::InvalidInput { .. }));

    let in_progress = harness.tasks.transition(task.id.as_str(), TaskStatus::InProgress, false).expect("open -> in_progress");
    assert_eq!(in_progress.status, TaskStatus::InProgress);

    let closed = harness.tasks.transition(task.id.as_str(), TaskStatus::Closed, false).expect("in_progress -> closed");
    assert_eq!(closed.status, TaskStatus::Closed);
}

/// `skip_validation` permits the direct open -> closed shortcut.
#[test]
fn skip_validation_allows_direct_close() {
    let harness = Harness::new();
    let task = harness.tasks.create(PROJECT_ID, "t", TaskType::Task, 2).expect("create");
    let closed = harness.tasks.transition(task.id.as_str(), TaskStatus::Closed, true).expect("skip_validation close");
    assert_eq!(closed.status, TaskStatus::Closed);
}
