// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use gobby_core::GobbyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowLoadError {
    #[error("io error reading {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("yaml parse error in {path}: {source}")]
    Yaml { path: String, source: serde_yaml::Error },
    #[error("workflow {0} not found in any tier")]
    NotFound(String),
    #[error("extends cycle detected: {0}")]
    ExtendsCycle(String),
    #[error("validation failed for workflow {name}: {reason}")]
    Validation { name: String, reason: String },
}

impl From<WorkflowLoadError> for GobbyError {
    fn from(e: WorkflowLoadError) -> Self {
        GobbyError::WorkflowLoadError { reason: e.to_string() }
    }
}

pub type WorkflowLoadResult<T> = Result<T, WorkflowLoadError>;
