// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed error-kind taxonomy shared across every Gobby crate boundary.

use thiserror::Error;

/// Closed set of error kinds. Crate-local error enums convert into this at
/// their public boundary (see each crate's `From` impls).
#[derive(Debug, Error, Clone)]
pub enum GobbyError {
    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("timeout after {duration_ms}ms: {reason}")]
    Timeout { reason: String, duration_ms: u64 },

    #[error("storage error: {reason}")]
    StorageError { reason: String },

    #[error("workflow load error: {reason}")]
    WorkflowLoadError { reason: String },

    #[error("evaluation error: {reason}")]
    EvaluationError { reason: String },

    #[error("action error: {action}: {reason}")]
    ActionError { action: String, reason: String },

    #[error("cancelled")]
    Cancelled,
}

impl GobbyError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound { reason: reason.into() }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict { reason: reason.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput { reason: reason.into() }
    }

    /// Kind name, used in structured logs and `{status, error}` payloads
    /// internal registries return instead of escalating to MCP protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::InvalidInput { .. } => "invalid_input",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::StorageError { .. } => "storage_error",
            Self::WorkflowLoadError { .. } => "workflow_load_error",
            Self::EvaluationError { .. } => "evaluation_error",
            Self::ActionError { .. } => "action_error",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type GobbyResult<T> = Result<T, GobbyError>;
