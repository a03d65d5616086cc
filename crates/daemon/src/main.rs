// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gobbyd — one daemon process per project directory (spec §6 "process
//! contract"). Usage: `gobbyd [project-dir]` (defaults to the current
//! directory). Acquires an exclusive lock on `.gobby/daemon.lock` before
//! binding its HTTP endpoint, so a second invocation against the same
//! project fails fast instead of racing the first.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use fs2::FileExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn project_dir() -> std::io::Result<PathBuf> {
    match std::env::args().nth(1) {
        Some(arg) => Ok(PathBuf::from(arg)),
        None => std::env::current_dir(),
    }
}

/// Exclusive advisory lock over `.gobby/daemon.lock`, holding the file
/// handle for the process lifetime (spec §6 "Resource acquisition": one
/// daemon per project). Mirrors the teacher's lock-before-bind startup
/// ordering so a failed acquire never touches state a running daemon owns.
fn acquire_lock(dot_gobby: &std::path::Path) -> Result<std::fs::File, gobby_daemon::DaemonError> {
    let lock_path = dot_gobby.join("daemon.lock");
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(gobby_daemon::DaemonError::Io)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|e| gobby_daemon::DaemonError::LockFailed(e.to_string()))?;

    let mut lock_file = lock_file;
    lock_file.set_len(0).map_err(gobby_daemon::DaemonError::Io)?;
    writeln!(lock_file, "{}", std::process::id()).map_err(gobby_daemon::DaemonError::Io)?;
    Ok(lock_file)
}

fn setup_logging(log_dir: &std::path::Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let project_dir = project_dir()?;
    let dot_gobby = project_dir.join(".gobby");
    std::fs::create_dir_all(&dot_gobby)?;

    let _log_guard = setup_logging(&dot_gobby.join("logs"))?;

    let _lock = match acquire_lock(&dot_gobby) {
        Ok(lock) => lock,
        Err(gobby_daemon::DaemonError::LockFailed(reason)) => {
            eprintln!("gobbyd is already running against {}: {reason}", project_dir.display());
            std::process::exit(1);
        }
        Err(e) => return Err(Box::new(e)),
    };

    let config = gobby_daemon::config::load(Some(&project_dir))?;
    info!(project_dir = %project_dir.display(), "starting gobbyd");

    let daemon = gobby_daemon::Daemon::bootstrap(project_dir, config).await?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    if let Err(e) = daemon.run(shutdown_rx).await {
        error!(error = %e, "daemon exited with error");
        return Err(Box::new(e));
    }
    Ok(())
}
