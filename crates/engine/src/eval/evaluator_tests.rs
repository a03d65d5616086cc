// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::eval::helpers::NullHelperProvider;
use serde_json::json;

struct MapHelpers {
    command: String,
    stop_signal: bool,
    mcp_server_tool: Option<(String, String)>,
}

impl HelperProvider for MapHelpers {
    fn has_previous_session(&self) -> bool {
        false
    }
    fn has_handoff(&self) -> bool {
        false
    }
    fn has_stop_signal(&self) -> bool {
        self.stop_signal
    }
    fn mcp_called(&self, server: &str, tool: &str) -> bool {
        self.mcp_server_tool.as_ref().map(|(s, t)| s == server && t == tool).unwrap_or(false)
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
    fn command_contains(&self, needle: &str) -> bool {
        self.command.contains(needle)
    }
    fn command_in(&self, list: &[String]) -> bool {
        list.iter().any(|c| c == &self.command)
    }
    fn user_says(&self, _word: &str) -> bool {
        false
    }
    fn is_plan_file(&self, path: &str) -> bool {
        path.ends_with("PLAN.md")
    }
}

fn ctx<'a>(event: &'a Value, helpers: &'a dyn HelperProvider) -> EvalContext<'a> {
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
fn equality_on_event_field() {
    let event = json!({"tool_name": "Edit"});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    assert!(eval_bool("event.tool_name == 'Edit'", &c).unwrap());
    assert!(!eval_bool("event.tool_name == 'Write'", &c).unwrap());
}

#[test]
fn attribute_access_on_none_is_null_access_error() {
    let event = json!({"tool_input": null});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    let err = eval_bool("event.tool_input.todos", &c).unwrap_err();
    assert!(matches!(err, EvalError::NullAccess(_)));
}

#[test]
fn missing_field_is_null_not_error() {
    let event = json!({"tool_name": "Edit"});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    // `event.nonexistent` is Null (not a runtime error) since `event` itself is an object.
    assert!(!eval_bool("event.nonexistent", &c).unwrap());
}

#[test]
fn short_circuit_and_does_not_evaluate_right_side_error() {
    let event = json!({"tool_input": null});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    // left side false => right side (which would NullAccess-error) never evaluated
    assert!(!eval_bool("false and event.tool_input.todos", &c).unwrap());
}

#[test]
fn short_circuit_or_does_not_evaluate_right_side_error() {
    let event = json!({"tool_input": null});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    assert!(eval_bool("true or event.tool_input.todos", &c).unwrap());
}

#[test]
fn helper_call_dispatches_to_provider() {
    let event = json!({});
    let helpers = MapHelpers { command: "git push --force".into(), stop_signal: true, mcp_server_tool: None };
    let c = ctx(&event, &helpers);
    assert!(eval_bool("command_contains('--force')", &c).unwrap());
    assert!(eval_bool("has_stop_signal()", &c).unwrap());
    assert!(!eval_bool("command_contains('--safe')", &c).unwrap());
}

#[test]
fn command_in_checks_list_membership() {
    let event = json!({});
    let helpers = MapHelpers { command: "ls".into(), stop_signal: false, mcp_server_tool: None };
    let c = ctx(&event, &helpers);
    assert!(eval_bool("command_in(['ls', 'pwd'])", &c).unwrap());
    assert!(!eval_bool("command_in(['rm', 'pwd'])", &c).unwrap());
}

#[test]
fn in_operator_on_string_is_substring_containment() {
    let event = json!({"prompt_text": "please proceed"});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    assert!(eval_bool("'proceed' in event.prompt_text", &c).unwrap());
}

#[test]
fn unknown_helper_name_is_rejected() {
    let event = json!({});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    let err = eval_bool("totally_made_up_helper()", &c).unwrap_err();
    assert!(matches!(err, EvalError::UnknownHelper(_)));
}

#[test]
fn evaluation_never_mutates_context_repeated_eval_same_result() {
    let event = json!({"tool_name": "Edit", "count": 3});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    let first = eval_bool("event.count > 2", &c).unwrap();
    let second = eval_bool("event.count > 2", &c).unwrap();
    assert_eq!(first, second);
    assert_eq!(event, json!({"tool_name": "Edit", "count": 3}));
}

#[test]
fn arithmetic_and_numeric_comparison() {
    let event = json!({"phase_action_count": 5});
    let helpers = NullHelperProvider;
    let c = ctx(&event, &helpers);
    assert!(eval_bool("event.phase_action_count + 1 > 5", &c).unwrap());
}
