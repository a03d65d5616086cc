// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn session() -> Session {
    Session::new(
        SessionId::from_string("ses-000001"),
        ProjectId::from_string("prj-000001"),
        CliSource::ClaudeCode,
        "2026-01-01T00:00:00Z".into(),
    )
}

#[test]
fn active_to_handoff_ready_is_allowed() {
    let mut s = session();
    assert!(s.transition(SessionStatus::HandoffReady).is_ok());
    assert_eq!(s.status, SessionStatus::HandoffReady);
}

#[test]
fn terminated_to_active_is_rejected() {
    let mut s = session();
    s.transition(SessionStatus::Terminated).unwrap();
    let err = s.transition(SessionStatus::Active).unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
    // state unchanged on rejection
    assert_eq!(s.status, SessionStatus::Terminated);
}

#[test]
fn handoff_ready_to_expired_is_allowed() {
    let mut s = session();
    s.transition(SessionStatus::HandoffReady).unwrap();
    assert!(s.transition(SessionStatus::Expired).is_ok());
}
