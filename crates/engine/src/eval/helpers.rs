// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed, total, side-effect-free helper table (spec §4.3 "Helpers
//! exposed"). `HelperProvider` is the extension point plugins register
//! additional predicates against (spec §9 "Plugin/extension points").

use serde_json::Value;

pub trait HelperProvider: Send + Sync {
    fn has_previous_session(&self) -> bool;
    fn has_handoff(&self) -> bool;
    fn has_stop_signal(&self) -> bool;
    fn mcp_called(&self, server: &str, tool: &str) -> bool;
    fn mcp_result_is_null(&self) -> bool;
    fn mcp_failed(&self) -> bool;
    fn mcp_result_has(&self, path: &str, value: &Value) -> bool;
    fn task_tree_complete(&self, root: &str) -> bool;
    fn task_needs_user_review(&self, task_id: &str) -> bool;
    fn command_contains(&self, needle: &str) -> bool;
    fn command_in(&self, list: &[String]) -> bool;
    fn user_says(&self, word: &str) -> bool;
    fn is_plan_file(&self, path: &str) -> bool;

    /// Plugin-registered predicates not in the fixed built-in set. Returns
    /// `None` when `name` isn't a registered plugin helper (distinct from
    /// the helper itself returning `false`).
    fn custom(&self, _name: &str, _args: &[Value]) -> Option<bool> {
        None
    }
}

/// A helper provider with every predicate false — the safe default for
/// contexts with no session/event data (e.g. workflow-load-time validation).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHelperProvider;

impl HelperProvider for NullHelperProvider {
    fn has_previous_session(&self) -> bool {
        false
    }
    fn has_handoff(&self) -> bool {
        false
    }
    fn has_stop_signal(&self) -> bool {
        false
    }
    fn mcp_called(&self, _server: &str, _tool: &str) -> bool {
        false
    }
    fn mcp_result_is_null(&self) -> bool {
        false
    }
    fn mcp_failed(&self) -> bool {
        false
    }
    fn mcp_result_has(&self, _path: &str, _value: &Value) -> bool {
        false
    }
    fn task_tree_complete(&self, _root: &str) -> bool {
        false
    }
    fn task_needs_user_review(&self, _task_id: &str) -> bool {
        false
    }
    fn command_contains(&self, _needle: &str) -> bool {
        false
    }
    fn command_in(&self, _list: &[String]) -> bool {
        false
    }
    fn user_says(&self, _word: &str) -> bool {
        false
    }
    fn is_plan_file(&self, _path: &str) -> bool {
        false
    }
}
