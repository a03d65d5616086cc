// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session — one CLI conversation.

use serde::{Deserialize, Serialize};

use crate::project::ProjectId;

crate::define_ref_id! {
    /// Short reference for a session, e.g. `ses-a1b2c3`.
    pub struct SessionId("ses-");
}

/// Which CLI family originated a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CliSource {
    ClaudeCode,
    Gemini,
    Codex,
    Other,
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    HandoffReady,
    Expired,
    Terminated,
}

impl SessionStatus {
    /// Whether this transition is permitted. Modeled as a small table rather
    /// than an open-ended match so new states can't silently bypass it.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Active, HandoffReady)
                | (Active, Expired)
                | (Active, Terminated)
                | (HandoffReady, Terminated)
                | (HandoffReady, Expired)
                | (Expired, Terminated)
        )
    }
}

/// Token/cost aggregates tracked for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageAggregate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd_millicents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub project_id: ProjectId,
    pub source: CliSource,
    pub status: SessionStatus,
    pub started_at: String,
    /// LLM-synthesized once, early in the session.
    #[serde(default)]
    pub title: Option<String>,
    /// LLM-generated at session end.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub usage: UsageAggregate,
    #[serde(default)]
    pub autonomous: bool,
    #[serde(default)]
    pub parent_session_id: Option<SessionId>,
    /// OS pid of a platform process, when known; used by the lifecycle
    /// manager to reap sessions whose process is gone.
    #[serde(default)]
    pub platform_pid: Option<u32>,
}

impl Session {
    pub fn new(
        session_id: SessionId,
        project_id: ProjectId,
        source: CliSource,
        started_at: String,
    ) -> Self {
        Self {
            session_id,
            project_id,
            source,
            status: SessionStatus::Active,
            started_at,
            title: None,
            summary: None,
            usage: UsageAggregate::default(),
            autonomous: false,
            parent_session_id: None,
            platform_pid: None,
        }
    }

    /// Apply a status transition, rejecting illegal edges.
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), crate::error::GobbyError> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::GobbyError::invalid(format!(
                "illegal session transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
