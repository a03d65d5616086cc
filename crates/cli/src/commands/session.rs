// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gobby session` — read-only session inspection (spec §4 `gobby-cli`).

use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Subcommand;

use crate::daemon_client;

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List every session tracked for this project
    List,
    /// Show one session by id or id prefix
    Get { id: String },
}

pub fn run(command: SessionCommand, _project_dir: &Path) -> Result<()> {
    let sessions = daemon_client::client().get_json("/sessions").map_err(|e| anyhow!("{e}"))?;
    let sessions = sessions.as_array().cloned().unwrap_or_default();

    match command {
        SessionCommand::List => {
            println!("{}", serde_json::to_string_pretty(&sessions)?);
            Ok(())
        }
        SessionCommand::Get { id } => {
            let found = sessions.iter().find(|s| {
                s.get("session_id")
                    .and_then(serde_json::Value::as_str)
                    .map(|existing| existing.starts_with(&id))
                    .unwrap_or(false)
            });
            match found {
                Some(session) => {
                    println!("{}", serde_json::to_string_pretty(session)?);
                    Ok(())
                }
                None => Err(anyhow!("no session matching id prefix {id}")),
            }
        }
    }
}
