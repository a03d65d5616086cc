// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection helpers shared by every subcommand: where `gobbyd`'s lock
//! file lives for a project directory, and a [`gobby_adapters::DaemonClient`]
//! pointed at its HTTP port.

use std::path::{Path, PathBuf};

use gobby_adapters::DaemonClient;

pub fn lock_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".gobby").join("daemon.lock")
}

/// The pid a running daemon wrote into its lock file, if any (spec §6
/// "Resource acquisition": the lock file is also the durable pid record).
pub fn running_pid(project_dir: &Path) -> Option<i32> {
    let contents = std::fs::read_to_string(lock_path(project_dir)).ok()?;
    contents.trim().parse().ok()
}

pub fn client() -> DaemonClient {
    DaemonClient::new(format!("127.0.0.1:{}", gobby_daemon::env::daemon_port()))
}
