// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gobby` — the operator CLI: daemon lifecycle, workflow reload, and
//! read-only task/session inspection (spec §4 crate table; the CLI hook
//! command surface itself is out of scope — that's `gobby-adapters`'
//! per-family binaries, invoked by the client CLI, not by an operator).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod daemon_client;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gobby", version, about = "Operator CLI for the gobbyd workflow daemon")]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon lifecycle: start, stop, status
    Daemon {
        #[command(subcommand)]
        command: commands::daemon::DaemonCommand,
    },
    /// Reload the project's active workflow definition from disk
    Workflow {
        #[command(subcommand)]
        command: commands::workflow::WorkflowCommand,
    },
    /// Inspect tasks tracked for this project
    Task {
        #[command(subcommand)]
        command: commands::task::TaskCommand,
    },
    /// Inspect sessions tracked for this project
    Session {
        #[command(subcommand)]
        command: commands::session::SessionCommand,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Daemon { command } => commands::daemon::run(command, &project_dir),
        Command::Workflow { command } => commands::workflow::run(command, &project_dir),
        Command::Task { command } => commands::task::run(command, &project_dir),
        Command::Session { command } => commands::session::run(command, &project_dir),
    }
}
