//! Phase-based workflow dispatch (spec §8 scenarios A, B; invariant 7).

use gobby_core::EventType;
use serde_json::json;

use crate::support::{parse_workflow, Harness};

const PLAN_EXECUTE: &str = r#"
name: plan-execute
type: phase
phases:
  - name: plan
    allowed_tools: [Read, Glob, Grep]
    exit_conditions:
      - type: user_approval
        prompt: "Ready to start executing?"
  - name: execute
    allowed_tools: all
"#;

/// Scenario A: a write tool attempted in a read-only phase is blocked, and
/// neither the phase nor its action count moves.
#[test]
fn plan_phase_blocks_write_tools() {
    let harness = Harness::new();
    harness.new_session("ses-000001");
    let workflow = parse_workflow(PLAN_EXECUTE);

    let response = harness.fire(
        &workflow,
        "ses-000001",
        EventType::BeforeTool,
        json!({"tool_name": "Edit", "tool_input": {"file_path": "src/lib.rs"}}),
    );

    assert_eq!(response.action, gobby_core::ResponseAction::Block);
    let message = response.message.expect("block carries a message");
    assert!(message.contains("plan"), "message should name the offending phase: {message}");

    let state = harness.state.get("ses-000001").expect("state initialized on first event");
    assert_eq!(state.phase, "plan");
    assert_eq!(state.phase_action_count, 0);
}

/// A tool already on the phase's allow-list is never blocked and the
/// action count advances normally (spec §8 invariant 7, converse case).
#[test]
fn plan_phase_allows_read_tools() {
    let harness = Harness::new();
    harness.new_session("ses-000002");
    let workflow = parse_workflow(PLAN_EXECUTE);

    let response =
        harness.fire(&workflow, "ses-000002", EventType::BeforeTool, json!({"tool_name": "Read"}));

    assert_eq!(response.action, gobby_core::ResponseAction::Continue);
    let state = harness.state.get("ses-000002").expect("state initialized");
    assert_eq!(state.phase, "plan");
    assert_eq!(state.phase_action_count, 1);
}

/// Scenario B: a `user_approval` exit condition with no explicit `when`
/// falls back to `user_says('yes')`; a prompt containing "yes" completes
/// the phase and advances to the next one in declaration order.
#[test]
fn user_approval_exit_condition_advances_phase() {
    let harness = Harness::new();
    harness.new_session("ses-000003");
    let workflow = parse_workflow(PLAN_EXECUTE);

    // Establish the plan phase first so the approval event isn't the one
    // that also initializes state.
    harness.fire(&workflow, "ses-000003", EventType::BeforeTool, json!({"tool_name": "Read"}));

    let response = harness.fire(
        &workflow,
        "ses-000003",
        EventType::PromptSubmit,
        json!({"prompt_text": "yes, let's go"}),
    );

    assert_eq!(response.action, gobby_core::ResponseAction::Continue);
    let state = harness.state.get("ses-000003").expect("state present");
    assert_eq!(state.phase, "execute");
    assert_eq!(state.phase_action_count, 0);
}

/// A prompt that doesn't satisfy the fallback predicate leaves the phase
/// untouched.
#[test]
fn user_approval_exit_condition_blocks_until_satisfied() {
    let harness = Harness::new();
    harness.new_session("ses-000004");
    let workflow = parse_workflow(PLAN_EXECUTE);

    harness.fire(&workflow, "ses-000004", EventType::BeforeTool, json!({"tool_name": "Read"}));
    harness.fire(
        &workflow,
        "ses-000004",
        EventType::PromptSubmit,
        json!({"prompt_text": "not yet, keep reading"}),
    );

    let state = harness.state.get("ses-000004").expect("state present");
    assert_eq!(state.phase, "plan");
}
