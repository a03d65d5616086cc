// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gobby task` — read-only task inspection (spec §4 `gobby-cli`).

use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Subcommand;

use crate::daemon_client;

#[derive(Subcommand)]
pub enum TaskCommand {
    /// List every task tracked for this project
    List,
    /// Show one task by id or id prefix
    Get { id: String },
}

pub fn run(command: TaskCommand, _project_dir: &Path) -> Result<()> {
    let tasks = daemon_client::client().get_json("/tasks").map_err(|e| anyhow!("{e}"))?;
    let tasks = tasks.as_array().cloned().unwrap_or_default();

    match command {
        TaskCommand::List => {
            println!("{}", serde_json::to_string_pretty(&tasks)?);
            Ok(())
        }
        TaskCommand::Get { id } => {
            let found = tasks.iter().find(|t| {
                t.get("id").and_then(serde_json::Value::as_str).map(|existing| existing.starts_with(&id)).unwrap_or(false)
            });
            match found {
                Some(task) => {
                    println!("{}", serde_json::to_string_pretty(task)?);
                    Ok(())
                }
                None => Err(anyhow!("no task matching id prefix {id}")),
            }
        }
    }
}
