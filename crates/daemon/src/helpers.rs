// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The real [`HelperProvider`] wired to storage (spec §4.3 "Helpers
//! exposed"). One instance is built per dispatched hook event; it borrows
//! the event JSON and session id and answers each predicate against the
//! managers, matching the "total, side-effect-free" contract the evaluator
//! requires.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use gobby_engine::eval::helpers::HelperProvider;
use gobby_storage::{HandoffManager, SessionManager, StopSignalManager, TaskManager};

/// One recorded MCP call result, used to answer `mcp_called`,
/// `mcp_result_is_null`, `mcp_failed`, `mcp_result_has` (spec §4.3).
#[derive(Debug, Clone)]
pub struct McpCallRecord {
    pub server: String,
    pub tool: String,
    pub result: Value,
    pub failed: bool,
}

/// Per-session rolling log of MCP calls made during the session so far.
/// Populated by the `call_mcp_tool` action and by the proxy's own routing
/// (spec §4.4 behavior-backed observer `mcp_call_tracking`).
#[derive(Default)]
pub struct McpCallLog {
    calls: RwLock<HashMap<String, Vec<McpCallRecord>>>,
}

impl McpCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session_id: &str, record: McpCallRecord) {
        self.calls.write().entry(session_id.to_string()).or_default().push(record);
    }

    fn called(&self, session_id: &str, server: &str, tool: &str) -> bool {
        self.calls
            .read()
            .get(session_id)
            .map(|calls| calls.iter().any(|c| c.server == server && c.tool == tool))
            .unwrap_or(false)
    }

    fn last(&self, session_id: &str) -> Option<McpCallRecord> {
        self.calls.read().get(session_id).and_then(|calls| calls.last().cloned())
    }
}

/// Wires the fixed helper table to `gobby-storage` and the per-session MCP
/// call log, so `when:` expressions anywhere (transitions, rules, action
/// guards, exit conditions) see the same facts (spec §4.3).
pub struct SessionHelperProvider {
    pub session_id: String,
    pub event_json: Value,
    pub tasks: Arc<TaskManager>,
    pub sessions: Arc<SessionManager>,
    pub stop_signals: Arc<StopSignalManager>,
    pub handoffs: Arc<HandoffManager>,
    pub mcp_log: Arc<McpCallLog>,
}

impl SessionHelperProvider {
    fn tool_input_str(&self, pointer: &str) -> Option<&str> {
        self.event_json.pointer(pointer).and_then(Value::as_str)
    }
}

impl HelperProvider for SessionHelperProvider {
    fn has_previous_session(&self) -> bool {
        self.sessions
            .get(&self.session_id)
            .map(|s| s.parent_session_id.is_some())
            .unwrap_or(false)
    }

    fn has_handoff(&self) -> bool {
        self.handoffs.peek(&self.session_id).is_some()
    }

    fn has_stop_signal(&self) -> bool {
        self.stop_signals.peek(&self.session_id).is_some()
    }

    fn mcp_called(&self, server: &str, tool: &str) -> bool {
        self.mcp_log.called(&self.session_id, server, tool)
    }

    fn mcp_result_is_null(&self) -> bool {
        self.mcp_log.last(&self.session_id).map(|r| r.result.is_null()).unwrap_or(false)
    }

    fn mcp_failed(&self) -> bool {
        self.mcp_log.last(&self.session_id).map(|r| r.failed).unwrap_or(false)
    }

    fn mcp_result_has(&self, path: &str, value: &Value) -> bool {
        let Some(record) = self.mcp_log.last(&self.session_id) else { return false };
        let pointer = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
        record.result.pointer(&pointer).map(|v| v == value).unwrap_or(false)
    }

    fn task_tree_complete(&self, root: &str) -> bool {
        let Some(task) = self.tasks.get(root) else { return false };
        if task.status != gobby_core::TaskStatus::Closed {
            return false;
        }
        let all = self.tasks.list(task.project_id.as_str(), None);
        all.iter()
            .filter(|t| t.parent_task_id.as_ref().map(|p| p.as_str()) == Some(task.id.as_str()))
            .all(|child| child.status == gobby_core::TaskStatus::Closed)
    }

    fn task_needs_user_review(&self, task_id: &str) -> bool {
        self.tasks.get(task_id).map(|t| t.status == gobby_core::TaskStatus::Escalated).unwrap_or(false)
    }

    fn command_contains(&self, needle: &str) -> bool {
        self.tool_input_str("/tool_input/command").map(|c| c.contains(needle)).unwrap_or(false)
    }

    fn command_in(&self, list: &[String]) -> bool {
        match self.tool_input_str("/tool_input/command") {
            Some(command) => list.iter().any(|c| c == command),
            None => false,
        }
    }

    fn user_says(&self, word: &str) -> bool {
        self.event_json
            .pointer("/prompt_text")
            .and_then(Value::as_str)
            .map(|p| p.to_ascii_lowercase().contains(&word.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn is_plan_file(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        lower.ends_with("plan.md") || lower.contains("/plans/")
    }
}
