// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stop signal — per-session record consumed by the autonomous loop (spec §3, §4.11).

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSignal {
    pub session_id: SessionId,
    pub reason: String,
    pub issued_at: String,
    pub source: String,
    /// `false`: graceful, completes the current step before stopping.
    /// `true`: abort immediately (spec §5 Cancellation).
    #[serde(default)]
    pub force: bool,
}
