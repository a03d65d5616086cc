// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter-local error enum (spec §6 "adapters translate ... the process
//! contract"). Kept separate from `gobby_core::GobbyError` because these
//! failures (malformed vendor payload, daemon unreachable) never cross into
//! the daemon itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unrecognized CLI family: {0}")]
    UnknownCli(String),

    #[error("malformed hook payload: {0}")]
    Malformed(String),

    #[error("daemon unreachable at {addr}: {source}")]
    Unreachable { addr: String, source: std::io::Error },

    #[error("daemon returned malformed response: {0}")]
    BadResponse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
