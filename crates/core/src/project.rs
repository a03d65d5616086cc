// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project — the unit of scoping for every other entity.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

crate::define_ref_id! {
    /// Short reference for a project, e.g. `prj-a1b2c3`.
    pub struct ProjectId("prj-");
}

/// A directory that has been initialized with a `.gobby/` store.
///
/// Owns its own database file (`.gobby/gobby.db`) and syncs writes to the
/// global hub (`~/.gobby/gobby-hub.db`). Created when a directory is
/// initialized; destroyed only by explicit user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Populated for cross-project aggregation in the hub database.
    pub uuid: Uuid,
    pub root: PathBuf,
    pub name: String,
    pub created_at: String,
}

impl Project {
    pub fn new(id: ProjectId, root: PathBuf, name: impl Into<String>, created_at: String) -> Self {
        Self { id, uuid: Uuid::new_v4(), root, name: name.into(), created_at }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(".gobby").join("gobby.db")
    }
}
