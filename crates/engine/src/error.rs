// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-local error enum, converting to [`gobby_core::GobbyError`] at the
//! crate boundary (spec §7), matching the teacher's `ExecuteError` style of
//! aggregating narrower error types.

use thiserror::Error;

use gobby_core::GobbyError;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("workflow load error: {0}")]
    Load(String),
    #[error("evaluation error: {0}")]
    Eval(String),
    #[error("action error in {action}: {reason}")]
    Action { action: String, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<EngineError> for GobbyError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Load(reason) => GobbyError::WorkflowLoadError { reason },
            EngineError::Eval(reason) => GobbyError::EvaluationError { reason },
            EngineError::Action { action, reason } => GobbyError::ActionError { action, reason },
            EngineError::Storage(reason) => GobbyError::StorageError { reason },
            EngineError::Cancelled => GobbyError::Cancelled,
        }
    }
}

impl From<GobbyError> for EngineError {
    fn from(e: GobbyError) -> Self {
        EngineError::Storage(e.to_string())
    }
}
