// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change events emitted by the storage layer to registered listeners
//! (spec §4.1), used to schedule debounced JSONL export and mark search
//! indices dirty.

use serde::{Deserialize, Serialize};

/// The entity kind a change event refers to. Kept as a plain string-backed
/// enum (rather than generic over entity types) so storage managers for
/// different entities can share one listener/channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Session,
    WorkflowState,
    Memory,
    Rule,
    Artifact,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub kind: ChangeKind,
    /// The entity's short reference id, as a plain string (entity-agnostic).
    pub id: String,
    pub project_id: String,
    pub at_epoch_ms: u64,
}
