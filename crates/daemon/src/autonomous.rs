// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The autonomous loop controller (spec §4.11): a thin set of services the
//! workflow engine's actions delegate to. The controller never decides
//! termination alone — it is always consulted by workflow actions which
//! then transition state, matching the "manager singleton owned by a
//! top-level value, threaded through calls" pattern (spec §9).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::process::Command;
use tracing::{info, warn};

use gobby_core::{GobbyError, GobbyResult, StopSignal};
use gobby_engine::actions::{AutonomousServices, SessionChainer};
use gobby_storage::StopSignalManager;

/// Thread-safe `session_id -> StopSignal` map (spec §4.11 "Stop registry").
/// `gobby_storage::StopSignalManager` is the durable side; this cache makes
/// `issue`/`consume` atomic in-process so a daemon restart losing the cache
/// only costs a reload from storage, never a lost durable signal.
pub struct StopRegistry {
    storage: Arc<StopSignalManager>,
    cache: RwLock<HashMap<String, StopSignal>>,
}

impl StopRegistry {
    pub fn new(storage: Arc<StopSignalManager>) -> Self {
        Self { storage, cache: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, signal: StopSignal) -> GobbyResult<()> {
        self.storage.issue(signal.clone())?;
        self.cache.write().insert(signal.session_id.as_str().to_string(), signal);
        Ok(())
    }

    /// Atomically read-and-clear (spec §4.11 `consume`).
    pub fn consume(&self, session_id: &str) -> GobbyResult<Option<StopSignal>> {
        let consumed = self.storage.consume(session_id)?;
        self.cache.write().remove(session_id);
        Ok(consumed)
    }

    pub fn peek(&self, session_id: &str) -> Option<StopSignal> {
        if let Some(hit) = self.cache.read().get(session_id).cloned() {
            return Some(hit);
        }
        self.storage.peek(session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Commit,
    FileChanged,
    ValidationAttempt,
    ValidationFailure,
    Step,
}

impl ProgressKind {
    fn from_str(s: &str) -> Self {
        match s {
            "commit" => Self::Commit,
            "file_changed" => Self::FileChanged,
            "validation_attempt" => Self::ValidationAttempt,
            "validation_failure" => Self::ValidationFailure,
            _ => Self::Step,
        }
    }
}

#[derive(Debug, Clone)]
struct ProgressWindow {
    last_progress_at: Instant,
    commits: u32,
    files_changed: u32,
    validation_attempts: u32,
    validation_failures: u32,
}

impl ProgressWindow {
    fn new() -> Self {
        Self {
            last_progress_at: Instant::now(),
            commits: 0,
            files_changed: 0,
            validation_attempts: 0,
            validation_failures: 0,
        }
    }
}

/// Per-session rolling window tracking commits, files changed, and
/// validation attempts (spec §4.11 "Progress tracker").
pub struct ProgressTracker {
    windows: RwLock<HashMap<String, ProgressWindow>>,
    stagnation_window: Duration,
}

impl ProgressTracker {
    pub fn new(stagnation_window: Duration) -> Self {
        Self { windows: RwLock::new(HashMap::new()), stagnation_window }
    }

    pub fn start(&self, session_id: &str) {
        self.windows.write().insert(session_id.to_string(), ProgressWindow::new());
    }

    pub fn stop(&self, session_id: &str) {
        self.windows.write().remove(session_id);
    }

    pub fn record(&self, session_id: &str, kind: ProgressKind) {
        let mut windows = self.windows.write();
        let window = windows.entry(session_id.to_string()).or_insert_with(ProgressWindow::new);
        window.last_progress_at = Instant::now();
        match kind {
            ProgressKind::Commit => window.commits += 1,
            ProgressKind::FileChanged => window.files_changed += 1,
            ProgressKind::ValidationAttempt => window.validation_attempts += 1,
            ProgressKind::ValidationFailure => window.validation_failures += 1,
            ProgressKind::Step => {}
        }
    }

    /// `true` when no new progress was recorded within the configured window.
    pub fn is_stagnant(&self, session_id: &str) -> bool {
        match self.windows.read().get(session_id) {
            Some(window) => window.last_progress_at.elapsed() > self.stagnation_window,
            None => false,
        }
    }
}

/// Spawns a detached CLI process for the same project, passing a rendered
/// handoff as system prompt (spec §4.11 `start_new_session`, §6 "Process
/// contract for session chaining"). Launched in a new session group with
/// stdio redirected to `/dev/null`; the parent never waits on the child.
pub struct ProcessSessionChainer;

#[async_trait::async_trait]
impl SessionChainer for ProcessSessionChainer {
    async fn start_new_session(
        &self,
        cli: &str,
        prompt: &str,
        system_prompt: &str,
        working_dir: &str,
    ) -> GobbyResult<u32> {
        let mut command = cli_command(cli, prompt, system_prompt);
        command
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // New session group so the daemon exiting doesn't signal the child
        // (spec §6 "launched in a new session group").
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command
            .spawn()
            .map_err(|e| GobbyError::InvalidInput { reason: format!("failed to spawn chained session: {e}") })?;
        let pid = child.id().ok_or_else(|| GobbyError::InvalidInput { reason: "spawned child has no pid".into() })?;
        info!(cli, pid, "spawned chained session");
        // Detach: never await the child, just record its pid for the
        // lifecycle manager to observe exit (spec §5 "Resource acquisition").
        std::mem::drop(child);
        Ok(pid)
    }
}

/// The canonical command line per CLI family (spec §6 "the child's command
/// is CLI-specific (canonical forms are specified per adapter)").
fn cli_command(cli: &str, prompt: &str, system_prompt: &str) -> Command {
    match cli {
        "claude_code" | "claude" => {
            let mut cmd = Command::new("claude");
            cmd.arg("--system-prompt").arg(system_prompt).arg(prompt);
            cmd
        }
        "gemini" => {
            let mut cmd = Command::new("gemini");
            cmd.arg("--system").arg(system_prompt).arg(prompt);
            cmd
        }
        "codex" => {
            let mut cmd = Command::new("codex");
            cmd.arg("--system-prompt").arg(system_prompt).arg(prompt);
            cmd
        }
        other => {
            warn!(cli = other, "unrecognized CLI family for session chaining, falling back to bare invocation");
            let mut cmd = Command::new(other);
            cmd.arg(prompt);
            cmd
        }
    }
}

/// Bundles stop registry + progress tracker behind the `AutonomousServices`
/// trait `gobby-engine`'s actions depend on (spec §9 "provider-agnostic
/// interface rather than hard-code any one shape").
pub struct DaemonAutonomousServices {
    pub stop_signals: Arc<StopRegistry>,
    pub progress: Arc<ProgressTracker>,
}

#[async_trait::async_trait]
impl AutonomousServices for DaemonAutonomousServices {
    async fn record_progress(&self, session_id: &str, kind: &str) {
        self.progress.record(session_id, ProgressKind::from_str(kind));
    }

    async fn is_stagnant(&self, session_id: &str) -> bool {
        self.progress.is_stagnant(session_id)
    }

    async fn start_tracking(&self, session_id: &str) {
        self.progress.start(session_id);
    }

    async fn stop_tracking(&self, session_id: &str) {
        self.progress.stop(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> StopRegistry {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(gobby_storage::store::Store::open(dir.path().join("p.journal"), None).unwrap());
        StopRegistry::new(Arc::new(StopSignalManager::new(store)))
    }

    #[test]
    fn issue_then_consume_round_trips_and_clears() {
        let reg = registry();
        let signal = StopSignal {
            session_id: gobby_core::SessionId::from_string("ses-000001"),
            reason: "user".into(),
            issued_at: "2026-01-01T00:00:00Z".into(),
            source: "api".into(),
            force: false,
        };
        reg.issue(signal).unwrap();
        assert!(reg.peek("ses-000001").is_some());
        let consumed = reg.consume("ses-000001").unwrap();
        assert!(consumed.is_some());
        assert!(reg.peek("ses-000001").is_none());
    }

    #[test]
    fn progress_tracker_is_stagnant_after_window_elapses() {
        let tracker = ProgressTracker::new(Duration::from_millis(10));
        tracker.start("ses-1");
        assert!(!tracker.is_stagnant("ses-1"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(tracker.is_stagnant("ses-1"));
    }

    #[test]
    fn progress_tracker_resets_on_record() {
        let tracker = ProgressTracker::new(Duration::from_millis(50));
        tracker.start("ses-1");
        std::thread::sleep(Duration::from_millis(20));
        tracker.record("ses-1", ProgressKind::Commit);
        assert!(!tracker.is_stagnant("ses-1"));
    }

    #[test]
    fn untracked_session_is_never_stagnant() {
        let tracker = ProgressTracker::new(Duration::from_millis(1));
        assert!(!tracker.is_stagnant("unknown-session"));
    }
}
