// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage-local error type, converting into [`gobby_core::GobbyError`] at
//! the crate boundary.

use gobby_core::GobbyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] crate::migrations::MigrationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for GobbyError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(reason) => GobbyError::NotFound { reason },
            StorageError::Conflict(reason) => GobbyError::Conflict { reason },
            other => GobbyError::StorageError { reason: other.to_string() },
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
