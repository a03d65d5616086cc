//! Autonomous stop signals (spec §8 scenario E, §4.11).

use gobby_core::{EventType, SessionId, StopSignal};
use serde_json::json;

use crate::support::{parse_workflow, Harness};

const WORK: &str = r#"
name: work
type: phase
phases:
  - name: work
    allowed_tools: all
triggers:
  before_tool:
    - action: check_stop_signal
"#;

/// Scenario E: once a stop signal is issued for a session, the next
/// `before_tool` event blocks with the signal's reason; consuming the
/// signal lets subsequent tool calls through again.
#[test]
fn stop_signal_blocks_until_consumed() {
    let harness = Harness::new();
    harness.new_session("ses-000005");
    let workflow = parse_workflow(WORK);

    harness
        .stop_signals
        .issue(StopSignal {
            session_id: SessionId::from_string("ses-000005"),
            reason: "budget exhausted".to_string(),
            issued_at: "2026-01-01T00:00:00Z".to_string(),
            source: "autonomous-loop".to_string(),
            force: false,
        })
        .expect("issue stop signal");

    let response =
        harness.fire(&workflow, "ses-000005", EventType::BeforeTool, json!({"tool_name": "Bash"}));
    assert_eq!(response.action, gobby_core::ResponseAction::Block);
    assert!(response.message.expect("block message").contains("budget exhausted"));

    harness.stop_signals.consume("ses-000005").expect("consume");
    assert!(harness.stop_signals.peek("ses-000005").is_none());

    let response =
        harness.fire(&workflow, "ses-000005", EventType::BeforeTool, json!({"tool_name": "Bash"}));
    assert_eq!(response.action, gobby_core::ResponseAction::Continue);
}

/// `consume` is a no-op (returns `None`, no journal write) when nothing is
/// pending.
#[test]
fn consume_without_a_pending_signal_is_a_noop() {
    let harness = Harness::new();
    assert!(harness.stop_signals.consume("ses-nobody").expect("consume").is_none());
}
