// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow state manager (spec §4.6): owns the per-session
//! [`WorkflowStateRecord`], exposing atomic primitives so every mutation
//! can fire a change event. An in-memory cache keyed by session id gives
//! write-through semantics over `gobby_storage::WorkflowStateStorage`,
//! mirroring the teacher's `storage::state` materialized-cache pattern.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use gobby_core::{Clock, GobbyResult, SystemClock};
use gobby_storage::{WorkflowStateRecord, WorkflowStateStorage};

/// Observations ring is bounded so a long-lived autonomous session's state
/// doesn't grow unboundedly (spec §3 "observations (bounded ring)").
const OBSERVATIONS_CAPACITY: usize = 50;

pub struct StateManager {
    storage: Arc<WorkflowStateStorage>,
    cache: RwLock<HashMap<String, WorkflowStateRecord>>,
    clock: SystemClock,
}

impl StateManager {
    pub fn new(storage: Arc<WorkflowStateStorage>) -> Self {
        Self { storage, cache: RwLock::new(HashMap::new()), clock: SystemClock }
    }

    fn load_into_cache(&self, session_id: &str) -> Option<WorkflowStateRecord> {
        if let Some(hit) = self.cache.read().get(session_id).cloned() {
            return Some(hit);
        }
        let loaded = self.storage.load(session_id)?;
        self.cache.write().insert(session_id.to_string(), loaded.clone());
        Some(loaded)
    }

    pub fn get(&self, session_id: &str) -> Option<WorkflowStateRecord> {
        self.load_into_cache(session_id)
    }

    /// Create state for the first hook event of a session (spec §3
    /// "Created on first hook event for the session").
    pub fn init(&self, session_id: &str, workflow_name: &str, initial_phase: &str) -> GobbyResult<WorkflowStateRecord> {
        if let Some(existing) = self.load_into_cache(session_id) {
            return Ok(existing);
        }
        let record = WorkflowStateRecord {
            session_id: session_id.to_string(),
            workflow_name: workflow_name.to_string(),
            phase: initial_phase.to_string(),
            phase_entered_at: self.clock.iso_now(),
            phase_action_count: 0,
            total_action_count: 0,
            artifacts: HashMap::new(),
            observations: Vec::new(),
            variables: HashMap::new(),
            current_task_index: None,
        };
        self.persist(record)
    }

    fn persist(&self, record: WorkflowStateRecord) -> GobbyResult<WorkflowStateRecord> {
        self.storage.save(record.clone())?;
        self.cache.write().insert(record.session_id.clone(), record.clone());
        Ok(record)
    }

    fn mutate(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut WorkflowStateRecord),
    ) -> GobbyResult<WorkflowStateRecord> {
        let mut record = self.load_into_cache(session_id).unwrap_or_else(|| WorkflowStateRecord {
            session_id: session_id.to_string(),
            ..Default::default()
        });
        f(&mut record);
        self.persist(record)
    }

    /// Enter `phase`, resetting `phase_action_count` and
    /// `phase_entered_at`. Idempotent w.r.t. re-entering the same phase
    /// (spec §8 round-trip property): a second `enter_phase(X)` call is a
    /// no-op rather than resetting the counter again.
    pub fn enter_phase(&self, session_id: &str, phase: &str) -> GobbyResult<WorkflowStateRecord> {
        let now = self.clock.iso_now();
        self.mutate(session_id, |s| {
            if s.phase == phase {
                return;
            }
            s.phase = phase.to_string();
            s.phase_entered_at = now;
            s.phase_action_count = 0;
        })
    }

    /// Marker for `on_exit` bookkeeping; the phase value itself only
    /// changes via the subsequent `enter_phase` call (spec §4.7 step 4).
    pub fn exit_phase(&self, session_id: &str) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |_| {})
    }

    pub fn set_variable(&self, session_id: &str, key: &str, value: Value) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |s| {
            s.variables.insert(key.to_string(), value);
        })
    }

    pub fn increment_variable(&self, session_id: &str, key: &str, by: f64) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |s| {
            let current = s.variables.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
            s.variables.insert(key.to_string(), serde_json::json!(current + by));
        })
    }

    pub fn clear_variable(&self, session_id: &str, key: &str) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |s| {
            s.variables.remove(key);
        })
    }

    pub fn push_observation(&self, session_id: &str, observation: impl Into<String>) -> GobbyResult<WorkflowStateRecord> {
        let observation = observation.into();
        self.mutate(session_id, |s| {
            s.observations.push(observation);
            if s.observations.len() > OBSERVATIONS_CAPACITY {
                let overflow = s.observations.len() - OBSERVATIONS_CAPACITY;
                s.observations.drain(0..overflow);
            }
        })
    }

    /// Action-executor-facing named blob capture (spec §4.8
    /// `capture_artifact`/`read_artifact`); distinct from the full
    /// `Artifact` entity, which is the tool-result capture extension point.
    pub fn capture_artifact(&self, session_id: &str, name: &str, content: impl Into<String>) -> GobbyResult<WorkflowStateRecord> {
        let content = content.into();
        self.mutate(session_id, |s| {
            s.artifacts.insert(name.to_string(), content);
        })
    }

    pub fn read_artifact(&self, session_id: &str, name: &str) -> Option<String> {
        self.load_into_cache(session_id).and_then(|s| s.artifacts.get(name).cloned())
    }

    /// Bump action counters after dispatching one event's actions
    /// (spec §3 "phase_action_count resets on phase entry").
    pub fn record_action(&self, session_id: &str) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |s| {
            s.phase_action_count += 1;
            s.total_action_count += 1;
        })
    }

    /// Bump only `total_action_count`, for a dispatch pass that transitioned
    /// into a new phase: `enter_phase` already reset `phase_action_count` to
    /// 0 for the freshly entered phase, and this pass hasn't taken an action
    /// *in* that phase yet, so bumping it back up would contradict spec §8
    /// scenario B's `phase_action_count == 0` right after the transition.
    pub fn record_action_after_transition(&self, session_id: &str) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |s| {
            s.total_action_count += 1;
        })
    }

    pub fn set_current_task_index(&self, session_id: &str, index: Option<u64>) -> GobbyResult<WorkflowStateRecord> {
        self.mutate(session_id, |s| {
            s.current_task_index = index;
        })
    }

    /// Soft-destroy on session termination (spec §3): removes the cache
    /// entry and the persisted record, leaving durable residue (tasks,
    /// artifacts, handoffs) intact elsewhere.
    pub fn destroy(&self, session_id: &str) -> GobbyResult<()> {
        self.cache.write().remove(session_id);
        self.storage.delete(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_storage::{store::Store, WorkflowStateStorage};
    use std::sync::Arc;

    fn manager() -> StateManager {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("p.db"), None).unwrap());
        StateManager::new(Arc::new(WorkflowStateStorage::new(store)))
    }

    #[test]
    fn init_is_idempotent_and_returns_existing_on_second_call() {
        let mgr = manager();
        let first = mgr.init("ses-1", "plan-execute", "plan").unwrap();
        let second = mgr.init("ses-1", "plan-execute", "plan").unwrap();
        assert_eq!(first.phase_entered_at, second.phase_entered_at);
    }

    #[test]
    fn enter_phase_resets_action_count_only_on_actual_change() {
        let mgr = manager();
        mgr.init("ses-1", "wf", "plan").unwrap();
        mgr.record_action("ses-1").unwrap();
        mgr.record_action("ses-1").unwrap();
        assert_eq!(mgr.get("ses-1").unwrap().phase_action_count, 2);

        mgr.enter_phase("ses-1", "plan").unwrap();
        assert_eq!(mgr.get("ses-1").unwrap().phase_action_count, 2, "re-entering same phase is a no-op");

        mgr.enter_phase("ses-1", "execute").unwrap();
        assert_eq!(mgr.get("ses-1").unwrap().phase_action_count, 0);
    }

    #[test]
    fn observations_ring_is_bounded() {
        let mgr = manager();
        mgr.init("ses-1", "wf", "plan").unwrap();
        for i in 0..(OBSERVATIONS_CAPACITY + 10) {
            mgr.push_observation("ses-1", format!("obs-{i}")).unwrap();
        }
        assert_eq!(mgr.get("ses-1").unwrap().observations.len(), OBSERVATIONS_CAPACITY);
    }

    #[test]
    fn capture_and_read_artifact_round_trip() {
        let mgr = manager();
        mgr.init("ses-1", "wf", "plan").unwrap();
        mgr.capture_artifact("ses-1", "plan_summary", "do the thing").unwrap();
        assert_eq!(mgr.read_artifact("ses-1", "plan_summary").as_deref(), Some("do the thing"));
    }

    #[test]
    fn destroy_removes_state() {
        let mgr = manager();
        mgr.init("ses-1", "wf", "plan").unwrap();
        mgr.destroy("ses-1").unwrap();
        assert!(mgr.get("ses-1").is_none());
    }
}
