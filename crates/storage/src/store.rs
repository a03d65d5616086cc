// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dual-write store: project DB + global hub DB (spec §4.1).
//!
//! Reads always target the project journal. Writes apply to the project
//! journal first, then mirror to the hub journal; a hub failure is logged
//! and non-fatal (the project remains the source of truth). Migration
//! failure on the project DB is fatal to `open`; hub migration failure
//! disables hub writes for the lifetime of this `Store` (spec §4.1
//! "Failures").

use std::path::Path;

use parking_lot::Mutex;
use tracing::warn;

use gobby_core::{ChangeEvent, ChangeKind, Clock, EntityKind, SystemClock};

use crate::error::StorageResult;
use crate::journal::{Journal, JournalEntry};
use crate::listener::{ChangeBus, ChangeSubscriber};
use crate::state::MaterializedState;

pub struct Store {
    project: Mutex<Journal>,
    /// `None` once hub writes have been disabled after a hub failure, or if
    /// the caller never configured a hub path (e.g. tests).
    hub: Mutex<Option<Journal>>,
    bus: ChangeBus,
    clock: SystemClock,
}

impl Store {
    /// Open the project journal at `project_path`; `hub_path` is optional
    /// (tests frequently run project-only). A corrupt/unreadable project
    /// journal is a fatal error for the caller — daemon startup refuses to
    /// proceed for that project, per spec §4.1.
    pub fn open(project_path: impl AsRef<Path>, hub_path: Option<&Path>) -> StorageResult<Self> {
        let project = Journal::open(project_path)?;
        let hub = match hub_path {
            Some(path) => match Journal::open(path) {
                Ok(j) => Some(j),
                Err(e) => {
                    warn!(error = %e, "hub journal failed to open; hub writes disabled for this run");
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            project: Mutex::new(project),
            hub: Mutex::new(hub),
            bus: ChangeBus::new(),
            clock: SystemClock,
        })
    }

    pub fn subscribe(&self) -> ChangeSubscriber {
        self.bus.subscribe()
    }

    /// Read a snapshot clone of the project's materialized state.
    pub fn snapshot(&self) -> MaterializedState {
        self.project.lock().state().clone()
    }

    /// Apply one entry to the project journal, mirror it to the hub
    /// journal (best-effort), and publish a change event.
    pub fn write(
        &self,
        entry: JournalEntry,
        entity: EntityKind,
        kind: ChangeKind,
        id: &str,
        project_id: &str,
    ) -> StorageResult<()> {
        self.project.lock().append(entry.clone())?;

        let mut hub_guard = self.hub.lock();
        if let Some(hub) = hub_guard.as_mut() {
            if let Err(e) = hub.append(entry) {
                warn!(error = %e, "hub write failed; disabling hub writes for this run");
                *hub_guard = None;
            }
        }
        drop(hub_guard);

        self.bus.publish(ChangeEvent {
            entity,
            kind,
            id: id.to_string(),
            project_id: project_id.to_string(),
            at_epoch_ms: self.clock.epoch_ms(),
        });
        Ok(())
    }

    /// `true` once the hub mirror has been disabled for this run (a hub
    /// write failed, or no hub was configured).
    pub fn hub_disabled(&self) -> bool {
        self.hub.lock().is_none()
    }

    pub fn compact_project(&self) -> StorageResult<()> {
        self.project.lock().compact()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
