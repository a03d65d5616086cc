// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gobby workflow` — hot-reload the project's active workflow definition
//! (spec §4 `gobby-cli`).

use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Subcommand;

use crate::daemon_client;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Re-resolve and hot-swap the configured workflow from disk
    Reload,
}

pub fn run(command: WorkflowCommand, _project_dir: &Path) -> Result<()> {
    match command {
        WorkflowCommand::Reload => reload(),
    }
}

fn reload() -> Result<()> {
    let body = daemon_client::client()
        .post_json("/workflow/reload", &serde_json::json!({}))
        .map_err(|e| anyhow!("{e}"))?;
    if body.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false) {
        println!("workflow reloaded");
        Ok(())
    } else {
        Err(anyhow!("workflow reload did not report success: {body}"))
    }
}
