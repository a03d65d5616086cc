// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hook event/response contract between CLI adapters and the daemon
//! (spec §3 "Hook event"/"Hook response", §4.2, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use gobby_core::{EventType, ResponseAction, TriggerSource};

/// The request object crossing from a CLI adapter into the hook pipeline.
/// Unknown fields survive round-trips via `extensions`, per the "duck-typed
/// event dicts" design note (spec §9) modeled as a tagged union plus an
/// extension bag rather than an open map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    pub event_type: EventType,
    /// The platform (CLI-native) session id — not yet resolved to a `SessionId`.
    pub session_id: String,
    #[serde(default)]
    pub project_hint: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_result: Option<serde_json::Value>,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub trigger_source: Option<TriggerSource>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Unrecognized top-level fields, preserved verbatim.
    #[serde(flatten)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl HookEvent {
    pub fn new(event_type: EventType, session_id: impl Into<String>) -> Self {
        Self {
            event_type,
            session_id: session_id.into(),
            project_hint: None,
            tool_name: None,
            tool_input: None,
            tool_result: None,
            prompt_text: None,
            transcript_path: None,
            trigger_source: None,
            metadata: HashMap::new(),
            extensions: HashMap::new(),
        }
    }
}

/// The decision returned to the CLI adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookResponse {
    pub action: ResponseAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_input: Option<serde_json::Value>,
}

impl HookResponse {
    pub fn continue_() -> Self {
        Self { action: ResponseAction::Continue, message: None, inject_context: None, modified_input: None }
    }

    pub fn block(message: impl Into<String>) -> Self {
        Self {
            action: ResponseAction::Block,
            message: Some(message.into()),
            inject_context: None,
            modified_input: None,
        }
    }

    pub fn modify(inject_context: impl Into<String>) -> Self {
        Self {
            action: ResponseAction::Modify,
            message: None,
            inject_context: Some(inject_context.into()),
            modified_input: None,
        }
    }

    /// Merge `other` into `self`, implementing the hook pipeline's
    /// accumulation rule (spec §4.7 step 7, §4.10): any `block` dominates;
    /// `inject_context` values are concatenated, later one's key wins ties
    /// when both set `modified_input`.
    pub fn merge(mut self, other: HookResponse) -> HookResponse {
        if self.action == ResponseAction::Block {
            return self;
        }
        if other.action == ResponseAction::Block {
            return other;
        }
        if let Some(ctx) = other.inject_context {
            self.inject_context = Some(match self.inject_context.take() {
                Some(existing) => format!("{existing}\n{ctx}"),
                None => ctx,
            });
            self.action = ResponseAction::Modify;
        }
        if other.modified_input.is_some() {
            self.modified_input = other.modified_input;
        }
        self
    }
}

impl Default for HookResponse {
    fn default() -> Self {
        Self::continue_()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_round_trip_via_extensions() {
        let json = r#"{"event_type":"before_tool","session_id":"s1","future_field":42}"#;
        let event: HookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.extensions.get("future_field"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn block_always_dominates_merge() {
        let continue_resp = HookResponse::continue_();
        let block_resp = HookResponse::block("denied");
        let merged = continue_resp.merge(block_resp.clone());
        assert_eq!(merged, block_resp);
    }

    #[test]
    fn block_survives_later_modify_merge() {
        let blocked = HookResponse::block("denied");
        let modify = HookResponse::modify("extra context");
        let merged = blocked.clone().merge(modify);
        assert_eq!(merged, blocked);
    }

    #[test]
    fn inject_context_concatenates_on_merge() {
        let a = HookResponse::modify("first");
        let b = HookResponse::modify("second");
        let merged = a.merge(b);
        assert_eq!(merged.inject_context.as_deref(), Some("first\nsecond"));
    }
}
