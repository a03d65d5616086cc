// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gobby_core::{ProjectId, TaskId, TaskStatus, TaskType};
use tempfile::tempdir;

fn sample_task(id: &str) -> gobby_core::Task {
    gobby_core::Task {
        id: TaskId::from_string(id),
        project_id: ProjectId::from_string("prj-000001"),
        parent_task_id: None,
        discovered_in_session_id: None,
        title: "x".into(),
        description: String::new(),
        status: TaskStatus::Open,
        priority: 1,
        task_type: TaskType::Task,
        labels: vec![],
        commits: vec![],
        validation_history: vec![],
        expansion_status: None,
        external_links: vec![],
        created_at: "now".into(),
        updated_at: "now".into(),
        closed_reason: None,
    }
}

#[test]
fn write_lands_in_project_and_mirrors_to_hub() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path().join("project.journal"), Some(&dir.path().join("hub.journal")))
        .unwrap();

    store
        .write(
            JournalEntry::TaskUpserted { task: sample_task("gt-aaaaaa") },
            EntityKind::Task,
            ChangeKind::Created,
            "gt-aaaaaa",
            "prj-000001",
        )
        .unwrap();

    assert!(store.snapshot().tasks.contains_key("gt-aaaaaa"));
    assert!(!store.hub_disabled());

    let hub = Journal::open(dir.path().join("hub.journal")).unwrap();
    assert!(hub.state().tasks.contains_key("gt-aaaaaa"));
}

#[test]
fn unwritable_hub_path_disables_hub_without_failing_project_write() {
    let dir = tempdir().unwrap();
    // A directory can't be opened as a journal file — forces the hub branch to fail.
    let bogus_hub = dir.path().join("hub-is-a-dir");
    std::fs::create_dir_all(&bogus_hub).unwrap();

    let store = Store::open(dir.path().join("project.journal"), Some(&bogus_hub)).unwrap();
    assert!(store.hub_disabled());

    store
        .write(
            JournalEntry::TaskUpserted { task: sample_task("gt-aaaaaa") },
            EntityKind::Task,
            ChangeKind::Created,
            "gt-aaaaaa",
            "prj-000001",
        )
        .unwrap();
    assert!(store.snapshot().tasks.contains_key("gt-aaaaaa"));
}

#[test]
fn write_publishes_a_change_event() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path().join("project.journal"), None).unwrap();
    let mut sub = store.subscribe();

    store
        .write(
            JournalEntry::TaskUpserted { task: sample_task("gt-aaaaaa") },
            EntityKind::Task,
            ChangeKind::Created,
            "gt-aaaaaa",
            "prj-000001",
        )
        .unwrap();

    let event = tokio_test_recv(&mut sub);
    assert_eq!(event.id, "gt-aaaaaa");
}

// Minimal blocking helper so this test doesn't need a #[tokio::test] runtime
// just to drain one already-published broadcast event.
fn tokio_test_recv(sub: &mut ChangeSubscriber) -> gobby_core::ChangeEvent {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(sub.recv()).expect("expected a change event")
}
