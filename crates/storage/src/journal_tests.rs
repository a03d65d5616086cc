// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gobby_core::{ProjectId, TaskId, TaskStatus, TaskType};
use tempfile::tempdir;

fn sample_task(id: &str) -> Task {
    Task {
        id: TaskId::from_string(id),
        project_id: ProjectId::from_string("prj-000001"),
        parent_task_id: None,
        discovered_in_session_id: None,
        title: "t".into(),
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
fn append_and_reopen_replays_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gobby.journal");

    {
        let mut journal = Journal::open(&path).unwrap();
        journal.append(JournalEntry::TaskUpserted { task: sample_task("gt-aaaaaa") }).unwrap();
    }

    let journal = Journal::open(&path).unwrap();
    assert!(journal.state().tasks.contains_key("gt-aaaaaa"));
    assert_eq!(journal.state().last_seq, 1);
}

#[test]
fn compact_preserves_materialized_state_and_shrinks_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gobby.journal");
    let mut journal = Journal::open(&path).unwrap();

    for i in 0..5 {
        let mut t = sample_task("gt-aaaaaa");
        t.updated_at = format!("v{i}");
        journal.append(JournalEntry::TaskUpserted { task: t }).unwrap();
    }
    let size_before = std::fs::metadata(&path).unwrap().len();
    journal.compact().unwrap();
    let size_after = std::fs::metadata(&path).unwrap().len();
    assert!(size_after <= size_before);
    assert_eq!(journal.state().tasks["gt-aaaaaa"].updated_at, "v4");

    drop(journal);
    let reopened = Journal::open(&path).unwrap();
    assert_eq!(reopened.state().tasks["gt-aaaaaa"].updated_at, "v4");
}

#[test]
fn stop_signal_issue_then_consume_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gobby.journal");
    let mut journal = Journal::open(&path).unwrap();

    let signal = gobby_core::StopSignal {
        session_id: gobby_core::SessionId::from_string("ses-aaaaaa"),
        reason: "user".into(),
        issued_at: "now".into(),
        source: "cli".into(),
        force: false,
    };
    journal.append(JournalEntry::StopSignalIssued { signal }).unwrap();
    assert!(journal.state().stop_signals.contains_key("ses-aaaaaa"));

    journal
        .append(JournalEntry::StopSignalConsumed { session_id: "ses-aaaaaa".into() })
        .unwrap();
    assert!(!journal.state().stop_signals.contains_key("ses-aaaaaa"));
}
