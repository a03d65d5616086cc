//! Compaction handoff (spec §8 scenario F).

use gobby_core::EventType;
use serde_json::json;

use crate::support::{parse_workflow, Harness};

const SESSION_HANDOFF: &str = r#"
name: session-handoff
type: lifecycle
triggers:
  pre_compact:
    - action: generate_handoff
      content: "Active task: gt-aaaaaa. Goal: ship the release."
  session_start:
    - action: restore_from_handoff
"#;

/// Scenario F: a `pre_compact` event captures a handoff; the following
/// `session_start` (same session, `source: compact`) injects it into the
/// response and removes it from storage.
#[test]
fn pre_compact_handoff_is_restored_on_next_session_start() {
    let harness = Harness::new();
    harness.new_session("ses-000006");
    let workflow = parse_workflow(SESSION_HANDOFF);

    let response = harness.fire(
        &workflow,
        "ses-000006",
        EventType::PreCompact,
        json!({"trigger_source": "auto"}),
    );
    assert_eq!(response.action, gobby_core::ResponseAction::Continue);
    assert!(harness.handoffs.peek("ses-000006").is_some(), "handoff should be stored after pre_compact");

    let response = harness.fire(
        &workflow,
        "ses-000006",
        EventType::SessionStart,
        json!({"source": "compact"}),
    );
    assert_eq!(response.action, gobby_core::ResponseAction::Modify);
    let injected = response.inject_context.expect("handoff content injected");
    assert!(injected.contains("ship the release"));

    assert!(harness.handoffs.peek("ses-000006").is_none(), "handoff is consumed, not left behind");
}

/// `restore_from_handoff` is a no-op when nothing was ever captured.
#[test]
fn session_start_without_a_handoff_is_a_plain_continue() {
    let harness = Harness::new();
    harness.new_session("ses-000007");
    let workflow = parse_workflow(SESSION_HANDOFF);

    let response =
        harness.fire(&workflow, "ses-000007", EventType::SessionStart, json!({"source": "startup"}));
    assert_eq!(response.action, gobby_core::ResponseAction::Continue);
}
