// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-local error enum, converted to `gobby_core::GobbyError` at the
//! crate boundary (spec §7).

use thiserror::Error;

use gobby_core::GobbyError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(String),

    #[error("lock held by another daemon instance: {0}")]
    LockFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] gobby_wire::ProtocolError),

    #[error(transparent)]
    Http(#[from] crate::http::HttpError),

    #[error(transparent)]
    Storage(#[from] gobby_storage::StorageError),

    #[error(transparent)]
    Engine(#[from] gobby_engine::EngineError),

    #[error(transparent)]
    WorkflowLoad(#[from] gobby_workflow::WorkflowLoadError),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error(transparent)]
    Core(#[from] GobbyError),
}

impl From<DaemonError> for GobbyError {
    fn from(e: DaemonError) -> Self {
        match e {
            DaemonError::Core(inner) => inner,
            DaemonError::UpstreamUnavailable(reason) => GobbyError::UpstreamUnavailable { reason },
            DaemonError::Storage(inner) => GobbyError::StorageError { reason: inner.to_string() },
            DaemonError::Engine(inner) => GobbyError::ActionError { action: "engine".into(), reason: inner.to_string() },
            DaemonError::WorkflowLoad(inner) => GobbyError::WorkflowLoadError { reason: inner.to_string() },
            other => GobbyError::InvalidInput { reason: other.to_string() },
        }
    }
}

pub type DaemonResult<T> = Result<T, DaemonError>;
