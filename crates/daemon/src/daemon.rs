// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level daemon wiring (spec §4, §6): one `Daemon` serves one project
//! directory, owning its storage, workflow engine inputs, MCP proxy,
//! autonomous-loop services, hook pipeline, and session lifecycle loop.
//! `bootstrap` assembles all of it from a `GobbyConfig`; `run` then drives
//! the HTTP listener until shutdown, mirroring the teacher's
//! `lifecycle::startup` + `Listener::run` split.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use gobby_core::{Clock, GobbyError, Project, ProjectId, SystemClock};
use gobby_engine::actions::{ActionExecutor, NullLlmProvider};
use gobby_engine::{RuleRegistry, StateManager};
use gobby_storage::store::Store;
use gobby_storage::{
    ArtifactManager, HandoffManager, ProjectManager, RuleManager, SessionManager, StopSignalManager, TaskManager,
    WorkflowStateStorage,
};
use gobby_wire::HookEvent;
use gobby_workflow::{WorkflowDefinition, WorkflowTiers};

use crate::autonomous::{DaemonAutonomousServices, ProcessSessionChainer, ProgressTracker, StopRegistry};
use crate::config::GobbyConfig;
use crate::env;
use crate::error::{DaemonError, DaemonResult};
use crate::helpers::McpCallLog;
use crate::http::{read_request, write_response, HttpRequest, HttpResponse};
use crate::lifecycle::LifecycleManager;
use crate::mcp_proxy::{InternalRegistry, ProxyManager, StubRegistry};
use crate::pipeline::{HookPipeline, HookPipelineDeps};
use crate::registries::{SessionsRegistry, TasksRegistry};

/// Wall-clock window after which an untouched autonomous session is
/// considered stagnant (spec §4.11 "Progress tracker"). Independent of
/// `AutonomousLoopConfig.stagnation_window_actions`, which bounds the
/// engine's own per-phase action-count stuck check (spec §4.7); this is a
/// coarser, time-based safety net underneath it.
const PROGRESS_STAGNATION_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Marker file recording the project's generated id across daemon restarts
/// (spec §3 "Created when a directory is initialized; destroyed only by
/// explicit user action" — the file, not just the DB row, is the durable
/// record of that identity).
const PROJECT_ID_FILE: &str = "project_id";

pub struct Daemon {
    pub project_id: String,
    pub project_dir: PathBuf,
    pub config: GobbyConfig,
    pub store: Arc<Store>,
    pub tasks: Arc<TaskManager>,
    pub sessions: Arc<SessionManager>,
    pub artifacts: Arc<ArtifactManager>,
    pub stop_signals: Arc<StopSignalManager>,
    pub handoffs: Arc<HandoffManager>,
    pub projects: Arc<ProjectManager>,
    pub proxy: Arc<ProxyManager>,
    pub pipeline: Arc<HookPipeline>,
    pub lifecycle: Arc<LifecycleManager>,
    pub stop_registry: Arc<StopRegistry>,
}

fn resolve_project_id(project_dir: &Path, projects: &ProjectManager) -> DaemonResult<String> {
    let marker = project_dir.join(".gobby").join(PROJECT_ID_FILE);
    if let Ok(existing) = std::fs::read_to_string(&marker) {
        let id = existing.trim().to_string();
        if !id.is_empty() {
            return Ok(id);
        }
    }

    let seed = project_dir.to_string_lossy().to_string();
    let exists = |candidate: &str| projects.get(&format!("{}{candidate}", ProjectId::PREFIX)).is_some();
    let id = ProjectId::generate(&seed, exists).map_err(|e: GobbyError| DaemonError::Config(e.to_string()))?;
    std::fs::write(&marker, id.as_str()).map_err(DaemonError::Io)?;
    Ok(id.as_str().to_string())
}

impl Daemon {
    /// Assemble every subsystem for `project_dir` from an already-loaded
    /// config (spec §4 component table, §6 "Resource acquisition").
    pub async fn bootstrap(project_dir: PathBuf, config: GobbyConfig) -> DaemonResult<Arc<Daemon>> {
        let dot_gobby = project_dir.join(".gobby");
        std::fs::create_dir_all(&dot_gobby).map_err(DaemonError::Io)?;

        let hub_path = config.hub_database_path.clone().or_else(crate::config::default_hub_path);
        let store = Arc::new(Store::open(dot_gobby.join("gobby.db"), hub_path.as_deref())?);

        let tasks = Arc::new(TaskManager::new(store.clone()));
        let sessions = Arc::new(SessionManager::new(store.clone()));
        let state_storage = Arc::new(WorkflowStateStorage::new(store.clone()));
        let rules_storage = Arc::new(RuleManager::new(store.clone()));
        let artifacts = Arc::new(ArtifactManager::new(store.clone()));
        let stop_signals = Arc::new(StopSignalManager::new(store.clone()));
        let handoffs = Arc::new(HandoffManager::new(store.clone()));
        let projects = Arc::new(ProjectManager::new(store.clone()));

        let project_id = resolve_project_id(&project_dir, &projects)?;
        if projects.get(&project_id).is_none() {
            let project = Project::new(
                ProjectId::from_string(project_id.clone()),
                project_dir.clone(),
                project_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| project_id.clone()),
                SystemClock.iso_now(),
            );
            projects.upsert(project)?;
        }

        let mut rules = RuleRegistry::new();
        rules.extend(rules_storage.list());

        let tiers = WorkflowTiers::project_only(dot_gobby.join("workflows"));
        let workflow = match gobby_workflow::load_workflow(&tiers, &config.workflow.name) {
            Ok(workflow) => workflow,
            Err(e) => {
                warn!(workflow = %config.workflow.name, error = %e, "no workflow loaded for project, hook events will fall through as continue");
                empty_workflow(&config.workflow.name)
            }
        };

        let state = Arc::new(StateManager::new(state_storage));
        let actions = Arc::new(ActionExecutor::new());
        let mcp_log = Arc::new(McpCallLog::new());

        let mut internal: Vec<Arc<dyn InternalRegistry>> = vec![
            Arc::new(TasksRegistry::new(project_id.clone(), tasks.clone())),
            Arc::new(SessionsRegistry::new(project_id.clone(), sessions.clone())),
        ];
        for name in crate::mcp_proxy::builtin_registry_names() {
            internal.push(Arc::new(StubRegistry::new(*name)));
        }
        let proxy = Arc::new(ProxyManager::new(config.mcp_servers.clone(), internal, mcp_log.clone()));
        proxy.connect_all().await;

        let stop_registry = Arc::new(StopRegistry::new(stop_signals.clone()));
        let progress = Arc::new(ProgressTracker::new(PROGRESS_STAGNATION_WINDOW));
        let autonomous = Arc::new(DaemonAutonomousServices { stop_signals: stop_registry.clone(), progress });

        let pipeline = Arc::new(HookPipeline::new(HookPipelineDeps {
            project_id: project_id.clone(),
            state,
            tasks: tasks.clone(),
            sessions: sessions.clone(),
            artifacts: artifacts.clone(),
            stop_signals: stop_signals.clone(),
            handoffs: handoffs.clone(),
            projects: projects.clone(),
            rules,
            actions,
            workflow,
            proxy: proxy.clone(),
            mcp_log,
            llm: Arc::new(NullLlmProvider),
            chainer: Arc::new(ProcessSessionChainer),
            autonomous,
        }));

        let lifecycle = Arc::new(LifecycleManager::new(sessions.clone(), tasks.clone(), project_dir.clone()));

        info!(project_id = %project_id, project_dir = %project_dir.display(), "daemon bootstrapped");

        Ok(Arc::new(Daemon {
            project_id,
            project_dir,
            config,
            store,
            tasks,
            sessions,
            artifacts,
            stop_signals,
            handoffs,
            projects,
            proxy,
            pipeline,
            lifecycle,
            stop_registry,
        }))
    }

    /// Run the hook-ingress HTTP listener plus background loops until
    /// `shutdown` resolves (spec §6 "local HTTP endpoint").
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> DaemonResult<()> {
        let port = env::daemon_port();
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(DaemonError::Io)?;
        info!(port, "hook ingress listening");

        let (lifecycle_shutdown_tx, lifecycle_shutdown_rx) = tokio::sync::oneshot::channel();
        let lifecycle_handle = tokio::spawn(self.lifecycle.clone().run(lifecycle_shutdown_rx));

        let proxy_for_retry = self.proxy.clone();
        let retry_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(env::mcp_retry_interval());
            loop {
                ticker.tick().await;
                proxy_for_retry.retry_degraded().await;
            }
        });

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "failed to accept hook ingress connection");
                            continue;
                        }
                    };
                    let daemon = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = daemon.serve_one(stream).await {
                            warn!(error = %e, "hook ingress connection failed");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("daemon shutting down");
                    break;
                }
            }
        }

        retry_handle.abort();
        let _ = lifecycle_shutdown_tx.send(());
        let _ = lifecycle_handle.await;
        Ok(())
    }

    async fn serve_one(&self, stream: TcpStream) -> DaemonResult<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let request = read_request(&mut reader).await?;
        let response = self.route(request).await;
        write_response(&mut write_half, response).await?;
        Ok(())
    }

    async fn route(&self, request: HttpRequest) -> HttpResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/hook") => self.handle_hook(&request.body).await,
            ("GET", "/status") => self.handle_status(),
            ("GET", "/tasks") => self.handle_tasks_list(),
            ("GET", "/sessions") => self.handle_sessions_list(),
            ("POST", "/workflow/reload") => self.handle_workflow_reload(),
            ("POST", path) if path.starts_with("/sessions/") && path.ends_with("/stop") => {
                self.handle_stop(path, &request.body)
            }
            _ => HttpResponse::not_found(),
        }
    }

    async fn handle_hook(&self, body: &[u8]) -> HttpResponse {
        let event: HookEvent = match serde_json::from_slice(body) {
            Ok(event) => event,
            Err(e) => return HttpResponse::bad_request(&format!("malformed hook event: {e}")),
        };
        let response = self.pipeline.handle_event(event).await;
        match serde_json::to_vec(&response) {
            Ok(bytes) => HttpResponse::ok_json(&bytes),
            Err(e) => HttpResponse::internal_error(&e.to_string()),
        }
    }

    fn handle_status(&self) -> HttpResponse {
        let body = serde_json::json!({
            "project_id": self.project_id,
            "project_dir": self.project_dir.display().to_string(),
            "mcp_catalog_size": self.proxy.full_catalog().len(),
        });
        HttpResponse::ok_json(&serde_json::to_vec(&body).unwrap_or_default())
    }

    fn handle_tasks_list(&self) -> HttpResponse {
        let tasks = self.tasks.list(&self.project_id, None);
        match serde_json::to_vec(&tasks) {
            Ok(bytes) => HttpResponse::ok_json(&bytes),
            Err(e) => HttpResponse::internal_error(&e.to_string()),
        }
    }

    fn handle_sessions_list(&self) -> HttpResponse {
        let sessions = self.sessions.list_by_project(&self.project_id);
        match serde_json::to_vec(&sessions) {
            Ok(bytes) => HttpResponse::ok_json(&bytes),
            Err(e) => HttpResponse::internal_error(&e.to_string()),
        }
    }

    /// `POST /workflow/reload` (spec §4 `gobby-cli` "workflow reload"):
    /// re-resolve `config.workflow.name` against the project's workflow
    /// tier and hot-swap it into the pipeline.
    fn handle_workflow_reload(&self) -> HttpResponse {
        let dot_gobby = self.project_dir.join(".gobby");
        let tiers = WorkflowTiers::project_only(dot_gobby.join("workflows"));
        match gobby_workflow::load_workflow(&tiers, &self.config.workflow.name) {
            Ok(workflow) => {
                self.pipeline.reload_workflow(workflow);
                info!(workflow = %self.config.workflow.name, "workflow reloaded");
                HttpResponse::ok_json(b"{\"ok\":true}")
            }
            Err(e) => HttpResponse::bad_request(&format!("workflow reload failed: {e}")),
        }
    }

    /// `POST /sessions/<id>/stop` (spec §8 Scenario E): issue a stop signal
    /// the next `before_tool` dispatch observes via `has_stop_signal`.
    fn handle_stop(&self, path: &str, body: &[u8]) -> HttpResponse {
        let Some(session_id) =
            path.strip_prefix("/sessions/").and_then(|rest| rest.strip_suffix("/stop"))
        else {
            return HttpResponse::bad_request("malformed session stop path");
        };
        let request: StopRequest = if body.is_empty() {
            StopRequest::default()
        } else {
            match serde_json::from_slice(body) {
                Ok(request) => request,
                Err(e) => return HttpResponse::bad_request(&format!("malformed stop request: {e}")),
            }
        };

        let signal = gobby_core::StopSignal {
            session_id: gobby_core::SessionId::from_string(session_id.to_string()),
            reason: request.reason,
            issued_at: SystemClock.iso_now(),
            source: "api".to_string(),
            force: request.force,
        };
        match self.stop_registry.issue(signal) {
            Ok(()) => HttpResponse::ok_json(b"{\"ok\":true}"),
            Err(e) => HttpResponse::internal_error(&e.to_string()),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct StopRequest {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    force: bool,
}

/// Fallback used when no workflow named `config.workflow.name` is found in
/// any tier (spec §4.7 step 1 "If no workflow: return continue"). A
/// `lifecycle` workflow with no triggers dispatches every event as a no-op,
/// which is exactly that contract expressed as data instead of a branch.
fn empty_workflow(name: &str) -> WorkflowDefinition {
    gobby_workflow::WorkflowDefinition {
        name: name.to_string(),
        extends: None,
        r#type: gobby_workflow::WorkflowType::Lifecycle,
        version: "1".to_string(),
        settings: gobby_workflow::WorkflowSettings::default(),
        variables: Default::default(),
        rule_definitions: Default::default(),
        tool_rules: Vec::new(),
        observers: Vec::new(),
        phases: Vec::new(),
        triggers: Default::default(),
    }
}
