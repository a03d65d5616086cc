// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session artifact — captured output tied to a session (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::session::SessionId;

crate::define_ref_id! {
    /// Short reference for an artifact, e.g. `art-a1b2c3`.
    pub struct ArtifactId("art-");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub session_id: SessionId,
    pub artifact_type: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: String,
}
