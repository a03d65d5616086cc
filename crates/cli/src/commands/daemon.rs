// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gobby daemon` — start, stop, status (spec §4 `gobby-cli`).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Result};
use clap::Subcommand;

use crate::daemon_client;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start gobbyd for this project (background unless --foreground)
    Start {
        #[arg(long)]
        foreground: bool,
    },
    /// Send SIGTERM to a running gobbyd for this project
    Stop,
    /// Report whether gobbyd is reachable and its project identity
    Status,
}

pub fn run(command: DaemonCommand, project_dir: &Path) -> Result<()> {
    match command {
        DaemonCommand::Start { foreground } => start(project_dir, foreground),
        DaemonCommand::Stop => stop(project_dir),
        DaemonCommand::Status => status(project_dir),
    }
}

fn start(project_dir: &Path, foreground: bool) -> Result<()> {
    let gobbyd = find_gobbyd_binary()?;

    if foreground {
        let status = Command::new(&gobbyd).arg(project_dir).status()?;
        if !status.success() {
            return Err(anyhow!("gobbyd exited with status: {status}"));
        }
        return Ok(());
    }

    if daemon_client::running_pid(project_dir).is_some() && daemon_client::client().get_json("/status").is_ok() {
        println!("gobbyd already running against {}", project_dir.display());
        return Ok(());
    }

    Command::new(&gobbyd)
        .arg(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn gobbyd: {e}"))?;
    println!("gobbyd started for {}", project_dir.display());
    Ok(())
}

fn stop(project_dir: &Path) -> Result<()> {
    let Some(pid) = daemon_client::running_pid(project_dir) else {
        println!("gobbyd not running for {}", project_dir.display());
        return Ok(());
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM)
        .map_err(|e| anyhow!("failed to signal gobbyd (pid {pid}): {e}"))?;
    println!("sent SIGTERM to gobbyd (pid {pid})");
    Ok(())
}

fn status(project_dir: &Path) -> Result<()> {
    match daemon_client::client().get_json("/status") {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(_) => {
            println!("gobbyd not reachable for {}", project_dir.display());
            Ok(())
        }
    }
}

/// Resolve the `gobbyd` binary: alongside this executable first, falling
/// back to `PATH` (spec §6 "one daemon process per project directory" —
/// the CLI and daemon ship as sibling binaries from the same build).
fn find_gobbyd_binary() -> Result<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("gobbyd");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    Ok(PathBuf::from("gobbyd"))
}
