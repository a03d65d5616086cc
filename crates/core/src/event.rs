// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed taxonomy of hook event types and hook response actions
//! (spec §4.2). CLI adapters translate vendor-specific hook invocations
//! into this uniform model; wire serialization lives in `gobby-wire`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    PreCompact,
    PromptSubmit,
    BeforeTool,
    AfterTool,
    Stop,
    SubagentStop,
    Notification,
    /// Unknown event types are logged and pass through as `continue`
    /// rather than rejected, per spec §4.2.
    #[serde(other)]
    Unknown,
}

/// What caused a trigger to fire (`spec.md` `trigger_source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Auto,
    Manual,
    Clear,
    Compact,
    #[serde(other)]
    Other,
}

/// The decision a hook response encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    Continue,
    Block,
    Modify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_event_type_deserializes_to_unknown() {
        let v: EventType = serde_json::from_str("\"totally_new_event\"").unwrap();
        assert_eq!(v, EventType::Unknown);
    }

    #[test]
    fn known_event_type_round_trips() {
        let v = EventType::BeforeTool;
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"before_tool\"");
        let back: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
