// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task — a unit of persistent work, and the dependency graph over tasks.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::GobbyError;
use crate::project::ProjectId;
use crate::session::SessionId;

crate::define_ref_id! {
    /// Short reference for a task, e.g. `gt-a1b2c3`.
    pub struct TaskId("gt-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Closed,
    Escalated,
}

impl TaskStatus {
    /// open -> in_progress -> (closed|escalated), with reopen edges back to open.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Open, InProgress)
                | (InProgress, Closed)
                | (InProgress, Escalated)
                | (InProgress, Open)
                | (Closed, Open)
                | (Escalated, Open)
                | (Escalated, InProgress)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Bug,
    Feature,
    Task,
    Epic,
    Chore,
}

/// One recorded attempt at closing a task, retained even after the task closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationAttempt {
    pub at: String,
    pub passed: bool,
    pub notes: Option<String>,
}

/// External issue-tracker link (GitHub/Linear), an out-of-scope extension
/// point per spec §1 — only the link shape lives in core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    pub tracker: String,
    pub external_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
    #[serde(default)]
    pub discovered_in_session_id: Option<SessionId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: u8,
    pub task_type: TaskType,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub commits: Vec<String>,
    #[serde(default)]
    pub validation_history: Vec<ValidationAttempt>,
    #[serde(default)]
    pub expansion_status: Option<String>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub closed_reason: Option<String>,
}

impl Task {
    /// Apply a status transition, enforcing invariant (2) of spec §3/§8:
    /// a task reaching `in_progress` must previously have been `open`;
    /// `closed` requires a preceding `in_progress` unless `skip_validation`.
    pub fn transition(
        &mut self,
        next: TaskStatus,
        skip_validation: bool,
        now: &str,
    ) -> Result<(), GobbyError> {
        let allowed = self.status.can_transition_to(next)
            || (self.status == TaskStatus::Open && next == TaskStatus::Closed && skip_validation);
        if !allowed {
            return Err(GobbyError::invalid(format!(
                "illegal task transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now.to_string();
        Ok(())
    }

    pub fn priority_clamped(priority: u8) -> u8 {
        priority.clamp(1, 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepType {
    Blocks,
    Related,
    DiscoveredFrom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub from: TaskId,
    pub to: TaskId,
    pub dep_type: DepType,
}

/// In-memory view of the `blocks` sub-graph, used both to enforce acyclicity
/// on insert (DFS, spec §3) and to answer `list_ready_tasks` queries.
#[derive(Debug, Default)]
pub struct TaskGraph {
    /// adjacency for `blocks` edges only: from -> [to, ...]
    blocks: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `blocks` edge, rejecting self-edges and edges that would
    /// create a cycle in the `blocks` sub-graph.
    pub fn insert_blocks(&mut self, from: TaskId, to: TaskId) -> Result<(), GobbyError> {
        if from == to {
            return Err(GobbyError::invalid("self-edges are forbidden"));
        }
        if self.reachable(&to, &from) {
            return Err(GobbyError::InvalidInput { reason: "cycle".to_string() });
        }
        self.blocks.entry(from).or_default().push(to);
        Ok(())
    }

    /// DFS reachability check: can `start` reach `target` via `blocks` edges?
    fn reachable(&self, start: &TaskId, target: &TaskId) -> bool {
        let mut seen: HashSet<&TaskId> = HashSet::new();
        let mut queue: VecDeque<&TaskId> = VecDeque::new();
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            if node == target {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(children) = self.blocks.get(node) {
                for c in children {
                    queue.push_back(c);
                }
            }
        }
        false
    }

    /// A task is blocked if some other task still has an outstanding `blocks`
    /// edge pointing at it and that blocking task is not yet closed.
    pub fn is_blocked(&self, task: &TaskId, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        self.blocks.iter().any(|(blocker, targets)| {
            targets.contains(task)
                && !matches!(statuses.get(blocker), Some(TaskStatus::Closed) | None)
        })
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
