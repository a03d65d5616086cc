// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned monotonic migrations over a JSON snapshot envelope
//! `{"v": <version>, "seq": <journal sequence>, "state": {...}}`.
//!
//! Both the project DB and the hub DB migrate independently on daemon
//! start (spec §4.1); project migration failure is fatal, hub migration
//! failure disables hub writes for the session (spec §4.1 "Failures").

use serde_json::Value;
use thiserror::Error;

/// Current on-disk snapshot schema version. Bump and add a [`Migration`]
/// whenever `state::MaterializedState`'s shape changes incompatibly.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than supported version {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    pub fn register(mut self, migration: Box<dyn Migration>) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Migrate `snapshot` (a `{"v", "seq", "state"}` envelope) up to `target`.
    /// A no-op if the snapshot is already at `target`.
    pub fn migrate_to(&self, mut snapshot: Value, target: u32) -> Result<Value, MigrationError> {
        let current = snapshot
            .get("v")
            .and_then(Value::as_u64)
            .ok_or_else(|| MigrationError::Malformed("missing \"v\"".to_string()))? as u32;

        if current == target {
            return Ok(snapshot);
        }
        if current > target {
            return Err(MigrationError::TooNew(current, target));
        }

        let mut version = current;
        while version < target {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(current, target))?;
            step.migrate(&mut snapshot)?;
            version = step.target_version();
            snapshot["v"] = serde_json::json!(version);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "migrations_tests.rs"]
mod tests;
