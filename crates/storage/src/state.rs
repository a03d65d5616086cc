// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state held in memory for one database (project or hub),
//! mirroring the teacher's `MaterializedState` pattern: plain `HashMap`s
//! keyed by short reference, snapshotted to disk and replayed from the
//! journal on startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use gobby_core::{Artifact, Project, RuleDefinition, Session, StopSignal, Task, TaskDependency};

/// Persisted per-session workflow state record (spec §3 "Workflow state").
/// The mutable atomic operations (`enter_phase`, `set_variable`, ...) live
/// in `gobby-engine::state`, which wraps this persisted shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStateRecord {
    pub session_id: String,
    pub workflow_name: String,
    pub phase: String,
    pub phase_entered_at: String,
    pub phase_action_count: u64,
    pub total_action_count: u64,
    #[serde(default)]
    pub artifacts: HashMap<String, String>,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub current_task_index: Option<u64>,
}

/// A durable handoff record captured for the next session in a chain
/// (spec §3 "workflow_handoffs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowHandoff {
    pub session_id: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub projects: HashMap<String, Project>,
    pub sessions: HashMap<String, Session>,
    pub tasks: HashMap<String, Task>,
    #[serde(default)]
    pub task_dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub workflow_states: HashMap<String, WorkflowStateRecord>,
    #[serde(default)]
    pub workflow_handoffs: HashMap<String, WorkflowHandoff>,
    #[serde(default)]
    pub rules: HashMap<String, RuleDefinition>,
    #[serde(default)]
    pub artifacts: HashMap<String, Artifact>,
    #[serde(default)]
    pub stop_signals: HashMap<String, StopSignal>,
    /// Monotonic journal sequence number of the last applied entry —
    /// used both for resumable replay and as the hub's "earlier-or-equal
    /// timestamp" audit trail (spec §8 invariant 4).
    #[serde(default)]
    pub last_seq: u64,
}

impl MaterializedState {
    /// Lookup by exact id or unique prefix, the way the teacher's
    /// `helpers::find_by_prefix` resolves short refs typed partially by a user.
    pub fn find_task_by_prefix(&self, id_or_prefix: &str) -> Option<&Task> {
        find_by_prefix(&self.tasks, id_or_prefix)
    }

    pub fn find_session_by_prefix(&self, id_or_prefix: &str) -> Option<&Session> {
        find_by_prefix(&self.sessions, id_or_prefix)
    }
}

pub(crate) fn find_by_prefix<'a, V>(map: &'a HashMap<String, V>, id_or_prefix: &str) -> Option<&'a V> {
    if let Some(v) = map.get(id_or_prefix) {
        return Some(v);
    }
    let mut matches = map.iter().filter(|(k, _)| k.starts_with(id_or_prefix));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None; // ambiguous prefix
    }
    Some(first.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::{ProjectId, SessionId, TaskId};

    #[test]
    fn exact_id_lookup_wins_over_prefix_scan() {
        let mut state = MaterializedState::default();
        state.tasks.insert(
            "gt-aaaaaa".into(),
            sample_task("gt-aaaaaa"),
        );
        assert!(state.find_task_by_prefix("gt-aaaaaa").is_some());
    }

    #[test]
    fn ambiguous_prefix_returns_none() {
        let mut state = MaterializedState::default();
        state.tasks.insert("gt-aaaaaa".into(), sample_task("gt-aaaaaa"));
        state.tasks.insert("gt-aaabbb".into(), sample_task("gt-aaabbb"));
        assert!(state.find_task_by_prefix("gt-aaa").is_none());
    }

    #[test]
    fn unique_prefix_resolves() {
        let mut state = MaterializedState::default();
        state.tasks.insert("gt-aaaaaa".into(), sample_task("gt-aaaaaa"));
        assert!(state.find_task_by_prefix("gt-aaa").is_some());
    }

    fn sample_task(id: &str) -> Task {
        Task {
            id: TaskId::from_string(id),
            project_id: ProjectId::from_string("prj-000001"),
            parent_task_id: None,
            discovered_in_session_id: None::<SessionId>,
            title: "t".into(),
            description: String::new(),
            status: gobby_core::TaskStatus::Open,
            priority: 1,
            task_type: gobby_core::TaskType::Task,
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
}
