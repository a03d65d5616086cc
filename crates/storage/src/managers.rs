// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-entity manager facades over [`Store`] — the typed CRUD + bulk-list +
//! query-by-reference surface spec §4.1 asks the storage layer to expose
//! (`TaskManager`, `SessionManager`, `WorkflowStateManager`, `RuleManager`, …).

use std::sync::Arc;

use gobby_core::{
    Artifact, ChangeKind, Clock, EntityKind, GobbyError, GobbyResult, Project, RuleDefinition,
    Session, StopSignal, SystemClock, Task, TaskDependency, TaskGraph, TaskId, TaskStatus,
};

use crate::journal::JournalEntry;
use crate::state::{WorkflowHandoff, WorkflowStateRecord};
use crate::store::Store;

/// Shared clock for managers that stamp `created_at`/`updated_at`.
fn now_iso() -> String {
    SystemClock.iso_now()
}

pub struct TaskManager {
    store: Arc<Store>,
}

impl TaskManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        project_id: &str,
        title: impl Into<String>,
        task_type: gobby_core::TaskType,
        priority: u8,
    ) -> GobbyResult<Task> {
        let snapshot = self.store.snapshot();
        let exists = |candidate: &str| snapshot.tasks.contains_key(&format!("gt-{candidate}"));
        let id = TaskId::generate(project_id, exists)?;
        let now = now_iso();
        let task = Task {
            id,
            project_id: project_id.into(),
            parent_task_id: None,
            discovered_in_session_id: None,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Open,
            priority: Task::priority_clamped(priority),
            task_type,
            labels: vec![],
            commits: vec![],
            validation_history: vec![],
            expansion_status: None,
            external_links: vec![],
            created_at: now.clone(),
            updated_at: now,
            closed_reason: None,
        };
        self.store
            .write(
                JournalEntry::TaskUpserted { task: task.clone() },
                EntityKind::Task,
                ChangeKind::Created,
                task.id.as_str(),
                project_id,
            )
            .map_err(GobbyError::from)?;
        Ok(task)
    }

    pub fn get(&self, id_or_prefix: &str) -> Option<Task> {
        self.store.snapshot().find_task_by_prefix(id_or_prefix).cloned()
    }

    pub fn list(&self, project_id: &str, status: Option<TaskStatus>) -> Vec<Task> {
        self.store
            .snapshot()
            .tasks
            .values()
            .filter(|t| t.project_id.as_str() == project_id)
            .filter(|t| status.map(|s| t.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn transition(
        &self,
        id: &str,
        next: TaskStatus,
        skip_validation: bool,
    ) -> GobbyResult<Task> {
        let mut task = self
            .store
            .snapshot()
            .find_task_by_prefix(id)
            .cloned()
            .ok_or_else(|| GobbyError::not_found(format!("task {id}")))?;
        task.transition(next, skip_validation, &now_iso())?;
        self.store
            .write(
                JournalEntry::TaskUpserted { task: task.clone() },
                EntityKind::Task,
                ChangeKind::Updated,
                task.id.as_str(),
                task.project_id.as_str(),
            )
            .map_err(GobbyError::from)?;
        Ok(task)
    }

    /// Insert a `blocks`/`related`/`discovered-from` dependency edge,
    /// rejecting cycles in the `blocks` sub-graph (spec §3, §8 scenario C).
    pub fn add_dependency(&self, dep: TaskDependency) -> GobbyResult<()> {
        let snapshot = self.store.snapshot();
        if dep.dep_type == gobby_core::DepType::Blocks {
            let mut graph = TaskGraph::new();
            for existing in &snapshot.task_dependencies {
                if existing.dep_type == gobby_core::DepType::Blocks {
                    graph.insert_blocks(existing.from.clone(), existing.to.clone()).ok();
                }
            }
            graph.insert_blocks(dep.from.clone(), dep.to.clone())?;
        }
        self.store
            .write(
                JournalEntry::TaskDependencyInserted { dependency: dep.clone() },
                EntityKind::Task,
                ChangeKind::Updated,
                dep.from.as_str(),
                "",
            )
            .map_err(GobbyError::from)?;
        Ok(())
    }

    /// Outgoing edges for one task, keyed the way spec §6's JSONL export
    /// attaches them: the blocked/dependent side (`to`) carries the
    /// `dependencies: [{depends_on, dep_type}]` array pointing back at the
    /// edge's `from` (spec §3 "Task dependency", §8 scenario C direction).
    pub fn dependencies_for(&self, task_id: &TaskId) -> Vec<TaskDependency> {
        self.store
            .snapshot()
            .task_dependencies
            .iter()
            .filter(|d| &d.to == task_id)
            .cloned()
            .collect()
    }

    /// Merge one imported task record into storage: last-write-wins by
    /// `updated_at` against any task already present under the same `id`
    /// (spec §6 "last-write-wins merge"); an incoming record older than the
    /// stored one is dropped, leaving the DB record untouched. Dependency
    /// edges are replayed through [`TaskManager::add_dependency`], skipping
    /// ones already present so re-import stays idempotent (spec §8
    /// "Task JSONL export followed by fresh import reproduces the same SQL
    /// state").
    pub fn import(&self, task: Task, dependencies: Vec<TaskDependency>) -> GobbyResult<()> {
        let existing = self.store.snapshot().tasks.get(task.id.as_str()).cloned();
        let should_write = match &existing {
            Some(existing) => task.updated_at >= existing.updated_at,
            None => true,
        };
        if should_write {
            self.store
                .write(
                    JournalEntry::TaskUpserted { task: task.clone() },
                    EntityKind::Task,
                    ChangeKind::Updated,
                    task.id.as_str(),
                    task.project_id.as_str(),
                )
                .map_err(GobbyError::from)?;
        }
        for dep in dependencies {
            let already_present = self
                .store
                .snapshot()
                .task_dependencies
                .iter()
                .any(|d| d.from == dep.from && d.to == dep.to && d.dep_type == dep.dep_type);
            if !already_present {
                self.add_dependency(dep)?;
            }
        }
        Ok(())
    }

    /// Tasks with `status == open` that have no outstanding `blocks` edge
    /// pointing at them from a non-closed task.
    pub fn list_ready(&self, project_id: &str) -> Vec<Task> {
        let snapshot = self.store.snapshot();
        let mut graph = TaskGraph::new();
        for dep in &snapshot.task_dependencies {
            if dep.dep_type == gobby_core::DepType::Blocks {
                graph.insert_blocks(dep.from.clone(), dep.to.clone()).ok();
            }
        }
        let statuses: std::collections::HashMap<TaskId, TaskStatus> =
            snapshot.tasks.values().map(|t| (t.id.clone(), t.status)).collect();
        snapshot
            .tasks
            .values()
            .filter(|t| t.project_id.as_str() == project_id)
            .filter(|t| t.status == TaskStatus::Open)
            .filter(|t| !graph.is_blocked(&t.id, &statuses))
            .cloned()
            .collect()
    }
}

pub struct SessionManager {
    store: Arc<Store>,
}

impl SessionManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn upsert(&self, session: Session) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::SessionUpserted { session: session.clone() },
                EntityKind::Session,
                ChangeKind::Updated,
                session.session_id.as_str(),
                session.project_id.as_str(),
            )
            .map_err(GobbyError::from)
    }

    pub fn get(&self, id_or_prefix: &str) -> Option<Session> {
        self.store.snapshot().find_session_by_prefix(id_or_prefix).cloned()
    }

    pub fn list_by_project(&self, project_id: &str) -> Vec<Session> {
        self.store
            .snapshot()
            .sessions
            .values()
            .filter(|s| s.project_id.as_str() == project_id)
            .cloned()
            .collect()
    }
}

/// Persistence-level workflow state CRUD. Atomic primitives
/// (`enter_phase`, `set_variable`, …) are layered on top by
/// `gobby-engine::state::StateManager` (spec §4.6).
pub struct WorkflowStateStorage {
    store: Arc<Store>,
}

impl WorkflowStateStorage {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn load(&self, session_id: &str) -> Option<WorkflowStateRecord> {
        self.store.snapshot().workflow_states.get(session_id).cloned()
    }

    pub fn save(&self, state: WorkflowStateRecord) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::WorkflowStateUpserted { state: state.clone() },
                EntityKind::WorkflowState,
                ChangeKind::Updated,
                &state.session_id,
                "",
            )
            .map_err(GobbyError::from)
    }

    pub fn delete(&self, session_id: &str) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::WorkflowStateDeleted { session_id: session_id.to_string() },
                EntityKind::WorkflowState,
                ChangeKind::Deleted,
                session_id,
                "",
            )
            .map_err(GobbyError::from)
    }
}

pub struct RuleManager {
    store: Arc<Store>,
}

impl RuleManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn upsert(&self, rule: RuleDefinition) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::RuleUpserted { rule: rule.clone() },
                EntityKind::Rule,
                ChangeKind::Updated,
                &rule.name,
                "",
            )
            .map_err(GobbyError::from)
    }

    /// Resolve a name to its highest-tier definition (spec §4.4).
    pub fn resolve(&self, name: &str) -> Option<RuleDefinition> {
        self.store.snapshot().rules.get(name).cloned()
    }

    pub fn list(&self) -> Vec<RuleDefinition> {
        self.store.snapshot().rules.values().cloned().collect()
    }
}

pub struct ArtifactManager {
    store: Arc<Store>,
}

impl ArtifactManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn capture(&self, artifact: Artifact) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::ArtifactInserted { artifact: artifact.clone() },
                EntityKind::Artifact,
                ChangeKind::Created,
                artifact.id.as_str(),
                "",
            )
            .map_err(GobbyError::from)
    }

    pub fn list_for_session(&self, session_id: &str) -> Vec<Artifact> {
        self.store
            .snapshot()
            .artifacts
            .values()
            .filter(|a| a.session_id.as_str() == session_id)
            .cloned()
            .collect()
    }

    /// Whether a short reference is already in use, for collision-checked
    /// id generation (spec §3 "collision-resistant scheme").
    pub fn exists(&self, short_ref: &str) -> bool {
        self.store.snapshot().artifacts.contains_key(short_ref)
    }
}

pub struct StopSignalManager {
    store: Arc<Store>,
}

impl StopSignalManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn issue(&self, signal: StopSignal) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::StopSignalIssued { signal: signal.clone() },
                EntityKind::Session,
                ChangeKind::Created,
                signal.session_id.as_str(),
                "",
            )
            .map_err(GobbyError::from)
    }

    /// Atomically read-and-clear a signal for a session (spec §3 "consumed
    /// when the workflow's stop check fires").
    pub fn consume(&self, session_id: &str) -> GobbyResult<Option<StopSignal>> {
        let existing = self.store.snapshot().stop_signals.get(session_id).cloned();
        if existing.is_some() {
            self.store
                .write(
                    JournalEntry::StopSignalConsumed { session_id: session_id.to_string() },
                    EntityKind::Session,
                    ChangeKind::Deleted,
                    session_id,
                    "",
                )
                .map_err(GobbyError::from)?;
        }
        Ok(existing)
    }

    pub fn peek(&self, session_id: &str) -> Option<StopSignal> {
        self.store.snapshot().stop_signals.get(session_id).cloned()
    }
}

/// Durable handoff residue captured for the next session in a chain
/// (spec §3 `workflow_handoffs`, §4.8 `generate_handoff`/`restore_from_handoff`).
pub struct HandoffManager {
    store: Arc<Store>,
}

impl HandoffManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self, handoff: WorkflowHandoff) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::WorkflowHandoffUpserted { handoff: handoff.clone() },
                EntityKind::Session,
                ChangeKind::Created,
                &handoff.session_id,
                "",
            )
            .map_err(GobbyError::from)
    }

    pub fn peek(&self, session_id: &str) -> Option<WorkflowHandoff> {
        self.store.snapshot().workflow_handoffs.get(session_id).cloned()
    }

    /// Consume (remove) a handoff once it's been injected into the chained
    /// session's first prompt (spec §8 scenario F).
    pub fn consume(&self, session_id: &str) -> GobbyResult<Option<WorkflowHandoff>> {
        let existing = self.store.snapshot().workflow_handoffs.get(session_id).cloned();
        if existing.is_some() {
            self.store
                .write(
                    JournalEntry::WorkflowHandoffConsumed { session_id: session_id.to_string() },
                    EntityKind::Session,
                    ChangeKind::Deleted,
                    session_id,
                    "",
                )
                .map_err(GobbyError::from)?;
        }
        Ok(existing)
    }
}

pub struct ProjectManager {
    store: Arc<Store>,
}

impl ProjectManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn upsert(&self, project: Project) -> GobbyResult<()> {
        self.store
            .write(
                JournalEntry::ProjectUpserted { project: project.clone() },
                EntityKind::Project,
                ChangeKind::Updated,
                project.id.as_str(),
                project.id.as_str(),
            )
            .map_err(GobbyError::from)
    }

    pub fn get(&self, id: &str) -> Option<Project> {
        self.store.snapshot().projects.get(id).cloned()
    }
}

#[cfg(test)]
#[path = "managers_tests.rs"]
mod tests;
