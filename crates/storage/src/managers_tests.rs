// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gobby_core::{DepType, TaskType};
use tempfile::tempdir;

fn open_store() -> Arc<Store> {
    // Leaking the tempdir keeps its path valid for the life of the test
    // without threading a guard value through every manager constructor.
    let dir = Box::leak(Box::new(tempdir().unwrap()));
    Arc::new(Store::open(dir.path().join("project.journal"), None).unwrap())
}

#[test]
fn task_manager_create_assigns_a_gt_prefixed_id() {
    let tasks = TaskManager::new(open_store());
    let task = tasks.create("prj-000001", "fix bug", TaskType::Bug, 2).unwrap();
    assert!(task.id.as_str().starts_with("gt-"));
    assert_eq!(task.priority, 2);
}

#[test]
fn task_manager_list_filters_by_status() {
    let tasks = TaskManager::new(open_store());
    let t1 = tasks.create("prj-000001", "a", TaskType::Task, 1).unwrap();
    tasks.create("prj-000001", "b", TaskType::Task, 1).unwrap();
    tasks.transition(t1.id.as_str(), TaskStatus::InProgress, false).unwrap();

    let in_progress = tasks.list("prj-000001", Some(TaskStatus::InProgress));
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, t1.id);
}

#[test]
fn task_manager_transition_rejects_illegal_edge() {
    let tasks = TaskManager::new(open_store());
    let t = tasks.create("prj-000001", "a", TaskType::Task, 1).unwrap();
    let err = tasks.transition(t.id.as_str(), TaskStatus::Closed, false).unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
}

#[test]
fn task_manager_add_dependency_rejects_cycle() {
    let tasks = TaskManager::new(open_store());
    let a = tasks.create("prj-000001", "a", TaskType::Task, 1).unwrap();
    let b = tasks.create("prj-000001", "b", TaskType::Task, 1).unwrap();

    tasks
        .add_dependency(TaskDependency { from: a.id.clone(), to: b.id.clone(), dep_type: DepType::Blocks })
        .unwrap();
    let err = tasks
        .add_dependency(TaskDependency { from: b.id.clone(), to: a.id.clone(), dep_type: DepType::Blocks })
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
}

#[test]
fn task_manager_list_ready_excludes_blocked_tasks() {
    let tasks = TaskManager::new(open_store());
    let blocker = tasks.create("prj-000001", "blocker", TaskType::Task, 1).unwrap();
    let blocked = tasks.create("prj-000001", "blocked", TaskType::Task, 1).unwrap();
    tasks
        .add_dependency(TaskDependency {
            from: blocker.id.clone(),
            to: blocked.id.clone(),
            dep_type: DepType::Blocks,
        })
        .unwrap();

    let ready_ids: Vec<_> = tasks.list_ready("prj-000001").into_iter().map(|t| t.id).collect();
    assert!(ready_ids.contains(&blocker.id));
    assert!(!ready_ids.contains(&blocked.id));

    tasks.transition(blocker.id.as_str(), TaskStatus::InProgress, false).unwrap();
    tasks.transition(blocker.id.as_str(), TaskStatus::Closed, false).unwrap();
    let ready_ids: Vec<_> = tasks.list_ready("prj-000001").into_iter().map(|t| t.id).collect();
    assert!(ready_ids.contains(&blocked.id));
}

#[test]
fn stop_signal_manager_consume_clears_after_read() {
    let store = open_store();
    let signals = StopSignalManager::new(store);
    let sid = gobby_core::SessionId::from_string("ses-aaaaaa");
    signals
        .issue(gobby_core::StopSignal {
            session_id: sid.clone(),
            reason: "user requested".into(),
            issued_at: "now".into(),
            source: "cli".into(),
            force: false,
        })
        .unwrap();

    assert!(signals.peek(sid.as_str()).is_some());
    let consumed = signals.consume(sid.as_str()).unwrap();
    assert!(consumed.is_some());
    assert!(signals.peek(sid.as_str()).is_none());
    assert!(signals.consume(sid.as_str()).unwrap().is_none());
}

#[test]
fn rule_manager_resolve_returns_latest_upsert() {
    let store = open_store();
    let rules = RuleManager::new(store);
    rules
        .upsert(gobby_core::RuleDefinition {
            name: "no-force-push".into(),
            tools: vec![],
            mcp_tools: vec![],
            command_pattern: None,
            when: "command_contains('--force')".into(),
            reason: "force push blocked".into(),
            action: gobby_core::RuleAction::Block,
            tier: gobby_core::RuleTier::Project,
        })
        .unwrap();

    let resolved = rules.resolve("no-force-push").unwrap();
    assert_eq!(resolved.tier, gobby_core::RuleTier::Project);
}

#[test]
fn handoff_manager_store_peek_consume_round_trip() {
    let store = open_store();
    let handoffs = HandoffManager::new(store);
    let handoff = crate::state::WorkflowHandoff {
        session_id: "ses-aaaaaa".into(),
        content: "active task gt-aaaaaa; todos: [done a, pending b]".into(),
        created_at: "2026-01-01T00:00:00Z".into(),
    };
    handoffs.store(handoff.clone()).unwrap();
    assert_eq!(handoffs.peek("ses-aaaaaa").unwrap().content, handoff.content);
    let consumed = handoffs.consume("ses-aaaaaa").unwrap();
    assert!(consumed.is_some());
    assert!(handoffs.peek("ses-aaaaaa").is_none());
}
