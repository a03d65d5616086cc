// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer evaluation (spec §3, §4.4): a YAML observer mirrors matching
//! event data into workflow variables; a behavior-backed observer delegates
//! to a registered native implementation for lookups the expression
//! language can't express (resolving task short-refs, tracking MCP calls
//! across a session).
//!
//! **Design decision** (spec §9 open question, resolved in `DESIGN.md`):
//! a YAML observer's `match` keys index the event's JSON object directly,
//! with one documented alias — `tool` means the `tool_name` field — matching
//! the one concrete example spec.md gives (`match: {tool: TodoWrite}`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use gobby_core::Observer;

use crate::eval::EvalContext;
use crate::template::render;

/// A native behavior observer handler: given the event JSON and the current
/// variables map, returns the variable updates to apply. Side-effect-free
/// beyond its return value, matching the plugin contract of spec §9
/// ("register observer behaviors ... declare payload schema").
pub type BehaviorFn = Arc<dyn Fn(&Value, &HashMap<String, Value>) -> Vec<(String, Value)> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ObserverEngine {
    behaviors: HashMap<String, BehaviorFn>,
}

impl ObserverEngine {
    pub fn new() -> Self {
        let mut engine = Self { behaviors: HashMap::new() };
        engine.register_builtins();
        engine
    }

    pub fn register_behavior(&mut self, name: impl Into<String>, f: BehaviorFn) {
        self.behaviors.insert(name.into(), f);
    }

    fn register_builtins(&mut self) {
        self.register_behavior(
            "task_claim_tracking",
            Arc::new(|event, _vars| {
                if event.get("tool_name").and_then(Value::as_str) == Some("gobby_tasks_claim") {
                    if let Some(id) = event.pointer("/tool_input/task_id").and_then(Value::as_str) {
                        return vec![("claimed_task_id".to_string(), Value::String(id.to_string()))];
                    }
                }
                vec![]
            }),
        );
        self.register_behavior(
            "detect_plan_mode",
            Arc::new(|event, _vars| {
                let is_plan = event.get("tool_name").and_then(Value::as_str) == Some("ExitPlanMode");
                vec![("plan_mode_active".to_string(), Value::Bool(is_plan))]
            }),
        );
        self.register_behavior(
            "mcp_call_tracking",
            Arc::new(|event, vars| {
                let Some(tool) = event.get("tool_name").and_then(Value::as_str) else {
                    return vec![];
                };
                let mut calls: Vec<Value> = vars
                    .get("mcp_calls")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                calls.push(Value::String(tool.to_string()));
                vec![("mcp_calls".to_string(), Value::Array(calls))]
            }),
        );
    }

    /// Apply every observer whose `on`/behavior matches `event_type_str`
    /// against `event_json`, returning the ordered set of variable updates
    /// (caller applies them through `StateManager::set_variable`, before
    /// rule/transition evaluation per spec §4.7 step 2).
    pub fn apply(
        &self,
        observers: &[Observer],
        event_type_str: &str,
        event_json: &Value,
        current_variables: &HashMap<String, Value>,
        ctx: &EvalContext,
    ) -> Vec<(String, Value)> {
        let mut updates = Vec::new();
        for obs in observers {
            match obs {
                Observer::Yaml { on, match_, set, .. } => {
                    if on != event_type_str {
                        continue;
                    }
                    if !matches_event(match_, event_json) {
                        continue;
                    }
                    for (var, template) in set {
                        updates.push((var.clone(), render(template, ctx)));
                    }
                }
                Observer::Behavior { behavior, .. } => {
                    if let Some(f) = self.behaviors.get(behavior) {
                        updates.extend(f(event_json, current_variables));
                    }
                }
            }
        }
        updates
    }
}

fn matches_event(match_: &HashMap<String, Value>, event_json: &Value) -> bool {
    match_.iter().all(|(k, expected)| {
        let field = if k == "tool" { "tool_name" } else { k.as_str() };
        event_json.get(field) == Some(expected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::helpers::NullHelperProvider;
    use serde_json::json;

    fn ctx<'a>(event: &'a Value, helpers: &'a NullHelperProvider) -> EvalContext<'a> {
        EvalContext {
            event,
            state: &Value::Null,
            variables: &Value::Null,
            settings: &Value::Null,
            session: &Value::Null,
            task: &Value::Null,
            helpers,
        }
    }

    #[test]
    fn yaml_observer_fires_on_matching_event_and_tool_alias() {
        let engine = ObserverEngine::new();
        let obs = Observer::Yaml {
            name: "todo_mirror".into(),
            on: "after_tool".into(),
            match_: [("tool".to_string(), json!("TodoWrite"))].into(),
            set: [("todo_state".to_string(), "{{ event.tool_input.todos }}".to_string())].into(),
        };
        let event = json!({"tool_name": "TodoWrite", "tool_input": {"todos": ["a"]}});
        let helpers = NullHelperProvider;
        let c = ctx(&event, &helpers);
        let updates = engine.apply(&[obs], "after_tool", &event, &HashMap::new(), &c);
        assert_eq!(updates, vec![("todo_state".to_string(), json!(["a"]))]);
    }

    #[test]
    fn yaml_observer_does_not_fire_on_mismatched_event_type() {
        let engine = ObserverEngine::new();
        let obs = Observer::Yaml {
            name: "todo_mirror".into(),
            on: "after_tool".into(),
            match_: HashMap::new(),
            set: [("x".to_string(), "1".to_string())].into(),
        };
        let event = json!({});
        let helpers = NullHelperProvider;
        let c = ctx(&event, &helpers);
        let updates = engine.apply(&[obs], "before_tool", &event, &HashMap::new(), &c);
        assert!(updates.is_empty());
    }

    #[test]
    fn behavior_observer_mcp_call_tracking_accumulates() {
        let engine = ObserverEngine::new();
        let obs = Observer::Behavior { name: "calls".into(), behavior: "mcp_call_tracking".into() };
        let event = json!({"tool_name": "gobby_tasks_list"});
        let helpers = NullHelperProvider;
        let c = ctx(&event, &helpers);
        let mut vars = HashMap::new();
        vars.insert("mcp_calls".to_string(), json!(["gobby_tasks_create"]));
        let updates = engine.apply(&[obs], "after_tool", &event, &vars, &c);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1, json!(["gobby_tasks_create", "gobby_tasks_list"]));
    }
}
