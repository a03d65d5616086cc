// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer — a declarative mirror from an event into workflow variables
//! (spec §3, §4.4).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A minimal match predicate over an event's shape: `{tool: "TodoWrite"}`
/// style key/value equality checks against the event's JSON representation.
pub type ObserverMatch = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observer {
    /// `{name, on: event, match: {...}, set: {variable: template}}`
    Yaml {
        name: String,
        on: String,
        #[serde(rename = "match", default)]
        match_: ObserverMatch,
        set: HashMap<String, String>,
    },
    /// `{name, behavior: registered_name}` — delegates to a native behavior
    /// registered at startup (e.g. `task_claim_tracking`, `detect_plan_mode`,
    /// `mcp_call_tracking`) that may perform lookups the expression language
    /// can't express.
    Behavior { name: String, behavior: String },
}

impl Observer {
    pub fn name(&self) -> &str {
        match self {
            Observer::Yaml { name, .. } => name,
            Observer::Behavior { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_observer_round_trips_through_json() {
        let obs = Observer::Yaml {
            name: "todo_mirror".into(),
            on: "after_tool".into(),
            match_: [("tool".to_string(), serde_json::json!("TodoWrite"))].into(),
            set: [("todo_state".to_string(), "{{ event.tool_input.todos }}".to_string())].into(),
        };
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "todo_mirror");
    }

    #[test]
    fn behavior_observer_round_trips() {
        let obs = Observer::Behavior { name: "claims".into(), behavior: "task_claim_tracking".into() };
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "claims");
    }
}
