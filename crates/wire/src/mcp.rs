// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP (Model Context Protocol) wire types the proxy manager speaks both as
//! a server (to the client CLI) and as a client (to upstream servers),
//! spec §4.9, §6.

use serde::{Deserialize, Serialize};

/// One tool catalog entry, as announced by an upstream server or a virtual
/// internal registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON-schema-shaped input description (kept opaque here; validated by
    /// the handler, matching the action executor's schema-per-handler model).
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum McpCallResponse {
    /// Internal registries never escalate storage errors as MCP-protocol
    /// errors — they return this structured payload instead (spec §4.9).
    Ok { result: serde_json::Value },
    Error { error: String, kind: String },
}

impl McpCallResponse {
    pub fn ok(result: serde_json::Value) -> Self {
        Self::Ok { result }
    }

    pub fn error(err: &gobby_core::GobbyError) -> Self {
        Self::Error { error: err.to_string(), kind: err.kind().to_string() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn is_null_result(&self) -> bool {
        matches!(self, Self::Ok { result } if result.is_null())
    }
}

/// Request/response envelope for the MCP catalog discovery call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpCatalogResponse {
    pub server: String,
    pub tools: Vec<McpToolSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_kind_for_status_payload() {
        let err = gobby_core::GobbyError::not_found("no such task");
        let resp = McpCallResponse::error(&err);
        match resp {
            McpCallResponse::Error { kind, .. } => assert_eq!(kind, "not_found"),
            _ => panic!("expected error variant"),
        }
    }

    #[test]
    fn ok_with_null_result_is_detected() {
        let resp = McpCallResponse::ok(serde_json::Value::Null);
        assert!(resp.is_null_result());
    }
}
