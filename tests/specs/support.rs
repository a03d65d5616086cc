//! Shared fixtures for the workspace-root integration tests (spec §8).
//!
//! A [`Harness`] wires one project's worth of real managers (no mocks
//! beyond the null LLM/MCP/chainer providers the engine itself ships for
//! exactly this purpose) and drives [`WorkflowEngine::dispatch`] the same
//! way `gobby-daemon`'s hook pipeline does, minus the HTTP transport and
//! per-session mutex (each test owns its harness exclusively).

use std::sync::Arc;

use serde_json::Value;

use gobby_core::{CliSource, Clock, EventType, Session, SessionId, SystemClock};
use gobby_daemon::helpers::{McpCallLog, SessionHelperProvider};
use gobby_engine::actions::{
    ActionContext, ActionExecutor, NullAutonomousServices, NullLlmProvider, NullMcpCaller,
    NullSessionChainer,
};
use gobby_engine::eval::helpers::HelperProvider;
use gobby_engine::{ObserverEngine, RuleRegistry, StateManager, WorkflowEngine};
use gobby_storage::store::Store;
use gobby_storage::{
    ArtifactManager, HandoffManager, ProjectManager, SessionManager, StopSignalManager, TaskManager,
    WorkflowStateStorage,
};
use gobby_wire::HookResponse;
use gobby_workflow::WorkflowDefinition;

pub const PROJECT_ID: &str = "prj-000001";

pub struct Harness {
    pub tasks: Arc<TaskManager>,
    pub sessions: Arc<SessionManager>,
    pub artifacts: Arc<ArtifactManager>,
    pub stop_signals: Arc<StopSignalManager>,
    pub handoffs: Arc<HandoffManager>,
    pub projects: Arc<ProjectManager>,
    pub state: Arc<StateManager>,
    pub mcp_log: Arc<McpCallLog>,
    engine: WorkflowEngine,
    rules: RuleRegistry,
    observers: ObserverEngine,
    actions: ActionExecutor,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(dir.path().join("project.journal"), None).expect("open store"));
        Self {
            tasks: Arc::new(TaskManager::new(store.clone())),
            sessions: Arc::new(SessionManager::new(store.clone())),
            artifacts: Arc::new(ArtifactManager::new(store.clone())),
            stop_signals: Arc::new(StopSignalManager::new(store.clone())),
            handoffs: Arc::new(HandoffManager::new(store.clone())),
            projects: Arc::new(ProjectManager::new(store.clone())),
            state: Arc::new(StateManager::new(Arc::new(WorkflowStateStorage::new(store)))),
            mcp_log: Arc::new(McpCallLog::new()),
            engine: WorkflowEngine::new(),
            rules: RuleRegistry::new(),
            observers: ObserverEngine::new(),
            actions: ActionExecutor::new(),
            _dir: dir,
        }
    }

    /// Register a new active session for [`PROJECT_ID`].
    pub fn new_session(&self, session_id: &str) {
        let session = Session::new(
            SessionId::from_string(session_id),
            gobby_core::ProjectId::from_string(PROJECT_ID),
            CliSource::ClaudeCode,
            SystemClock.iso_now(),
        );
        self.sessions.upsert(session).expect("create session");
    }

    fn helper_provider(&self, session_id: &str, event_json: Value) -> Arc<dyn HelperProvider> {
        Arc::new(SessionHelperProvider {
            session_id: session_id.to_string(),
            event_json,
            tasks: self.tasks.clone(),
            sessions: self.sessions.clone(),
            stop_signals: self.stop_signals.clone(),
            handoffs: self.handoffs.clone(),
            mcp_log: self.mcp_log.clone(),
        })
    }

    /// Dispatch one hook event through the engine, mirroring the shape the
    /// hook pipeline builds per event (spec §4.7, §4.10).
    pub fn fire(
        &self,
        workflow: &WorkflowDefinition,
        session_id: &str,
        event_type: EventType,
        event_json: Value,
    ) -> HookResponse {
        let tool_name = event_json.get("tool_name").and_then(Value::as_str).map(str::to_string);
        let helpers = self.helper_provider(session_id, event_json.clone());
        let mut ctx = ActionContext::new(
            session_id,
            PROJECT_ID,
            self.state.clone(),
            self.tasks.clone(),
            self.sessions.clone(),
            self.artifacts.clone(),
            self.stop_signals.clone(),
            self.handoffs.clone(),
            Arc::new(NullLlmProvider),
            Arc::new(NullMcpCaller),
            Arc::new(NullSessionChainer),
            Arc::new(NullAutonomousServices),
            helpers,
        );
        ctx.event_json = event_json;

        let input = gobby_engine::engine::DispatchInput {
            workflow,
            rules: &self.rules,
            observers: &self.observers,
            actions: &self.actions,
            event_type,
            tool_name: tool_name.as_deref(),
        };
        block_on(self.engine.dispatch(input, &mut ctx)).expect("engine dispatch")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// `WorkflowEngine::dispatch` is `async` only because its handlers may
/// await DB/MCP/LLM I/O (spec §5 "Suspension points"); the null providers
/// this harness wires never actually suspend, so a minimal single-threaded
/// executor is enough to drive it from a plain `#[test]` function.
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build current-thread runtime")
        .block_on(fut)
}

pub fn parse_workflow(yaml: &str) -> WorkflowDefinition {
    serde_yaml::from_str(yaml).expect("parse workflow yaml")
}
