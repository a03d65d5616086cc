// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hook pipeline (spec §4.10): the single entry point for every CLI
//! hook event. Owns the per-session serialization lock (spec §5), resolves
//! the event's session, builds a real [`ActionContext`], dispatches to the
//! workflow engine, then runs any registered non-workflow hook handlers —
//! all wrapped in an outer boundary that turns an unexpected error into a
//! `continue` response with a logged warning rather than failing the CLI
//! turn (spec §4.10, §7).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use gobby_core::{Artifact, Clock, CliSource, Session, SystemClock};
use gobby_engine::actions::{ActionContext, ActionExecutor, AutonomousServices, LlmProvider, SessionChainer};
use gobby_engine::{ObserverEngine, RuleRegistry, StateManager, WorkflowEngine};
use gobby_storage::{
    ArtifactManager, HandoffManager, ProjectManager, SessionManager, StopSignalManager, TaskManager,
};
use gobby_wire::{HookEvent, HookResponse};
use gobby_workflow::WorkflowDefinition;

use crate::helpers::{McpCallLog, SessionHelperProvider};
use crate::mcp_proxy::{ProxyManager, ProxyMcpCaller};

/// A non-workflow hook handler (spec §4.10: "artifact capture, metrics").
/// Handlers run in registration order after the workflow engine; the first
/// `block` short-circuits the rest, `modify` responses merge.
#[async_trait]
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, ctx: &mut ActionContext, event: &HookEvent) -> HookResponse;
}

/// Captures the tool result of file-editing tools as a durable [`Artifact`]
/// (spec §4.10 example handler, spec §3 `Artifact`).
pub struct ArtifactCaptureHandler {
    artifacts: Arc<ArtifactManager>,
}

impl ArtifactCaptureHandler {
    const CAPTURED_TOOLS: &'static [&'static str] = &["Write", "Edit", "MultiEdit"];

    pub fn new(artifacts: Arc<ArtifactManager>) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl HookHandler for ArtifactCaptureHandler {
    fn name(&self) -> &str {
        "artifact_capture"
    }

    async fn handle(&self, ctx: &mut ActionContext, event: &HookEvent) -> HookResponse {
        let Some(tool_name) = &event.tool_name else { return HookResponse::continue_() };
        if !Self::CAPTURED_TOOLS.contains(&tool_name.as_str()) {
            return HookResponse::continue_();
        }
        let Some(result) = &event.tool_result else { return HookResponse::continue_() };

        let exists = |candidate: &str| self.artifacts.exists(&format!("{}{candidate}", gobby_core::ArtifactId::PREFIX));
        let Ok(id) = gobby_core::ArtifactId::generate(&ctx.project_id, exists) else {
            return HookResponse::continue_();
        };
        let artifact = Artifact {
            id,
            session_id: gobby_core::SessionId::from_string(ctx.session_id.clone()),
            artifact_type: "tool_result".to_string(),
            title: tool_name.clone(),
            content: result.to_string(),
            file_path: event
                .tool_input
                .as_ref()
                .and_then(|v| v.pointer("/file_path"))
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: HashMap::new(),
            created_at: SystemClock.iso_now(),
        };
        if let Err(e) = self.artifacts.capture(artifact) {
            warn!(error = %e, "artifact capture failed");
        }
        HookResponse::continue_()
    }
}

/// Everything the pipeline needs to build one [`ActionContext`], gathered
/// behind `Arc`s so they're cheap to thread through a per-event dispatch
/// without locking the whole pipeline.
pub struct HookPipeline {
    project_id: String,
    state: Arc<StateManager>,
    tasks: Arc<TaskManager>,
    sessions: Arc<SessionManager>,
    artifacts: Arc<ArtifactManager>,
    stop_signals: Arc<StopSignalManager>,
    handoffs: Arc<HandoffManager>,
    #[allow(dead_code)]
    projects: Arc<ProjectManager>,
    rules: RuleRegistry,
    observers: ObserverEngine,
    actions: Arc<ActionExecutor>,
    engine: WorkflowEngine,
    workflow: RwLock<WorkflowDefinition>,
    proxy: Arc<ProxyManager>,
    mcp_log: Arc<McpCallLog>,
    llm: Arc<dyn LlmProvider>,
    chainer: Arc<dyn SessionChainer>,
    autonomous: Arc<dyn AutonomousServices>,
    handlers: Vec<Box<dyn HookHandler>>,
    /// One mutex per session id, serializing dispatch for that session
    /// (spec §5 "hook pipeline is serialized per session"); the registry
    /// itself is guarded separately so unrelated sessions never block.
    session_locks: RwLock<HashMap<String, Arc<AsyncMutex<()>>>>,
}

#[allow(clippy::too_many_arguments)]
pub struct HookPipelineDeps {
    pub project_id: String,
    pub state: Arc<StateManager>,
    pub tasks: Arc<TaskManager>,
    pub sessions: Arc<SessionManager>,
    pub artifacts: Arc<ArtifactManager>,
    pub stop_signals: Arc<StopSignalManager>,
    pub handoffs: Arc<HandoffManager>,
    pub projects: Arc<ProjectManager>,
    pub rules: RuleRegistry,
    pub actions: Arc<ActionExecutor>,
    pub workflow: WorkflowDefinition,
    pub proxy: Arc<ProxyManager>,
    pub mcp_log: Arc<McpCallLog>,
    pub llm: Arc<dyn LlmProvider>,
    pub chainer: Arc<dyn SessionChainer>,
    pub autonomous: Arc<dyn AutonomousServices>,
}

impl HookPipeline {
    pub fn new(deps: HookPipelineDeps) -> Self {
        Self {
            project_id: deps.project_id,
            state: deps.state,
            tasks: deps.tasks,
            sessions: deps.sessions,
            artifacts: deps.artifacts.clone(),
            stop_signals: deps.stop_signals,
            handoffs: deps.handoffs,
            projects: deps.projects,
            rules: deps.rules,
            observers: ObserverEngine::new(),
            actions: deps.actions,
            engine: WorkflowEngine::new(),
            workflow: RwLock::new(deps.workflow),
            proxy: deps.proxy,
            mcp_log: deps.mcp_log,
            llm: deps.llm,
            chainer: deps.chainer,
            autonomous: deps.autonomous,
            handlers: vec![Box::new(ArtifactCaptureHandler::new(deps.artifacts))],
            session_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Swap in a freshly-loaded workflow definition without restarting the
    /// daemon (spec §4 `gobby-cli` "workflow reload"). Already-running
    /// dispatches hold their own read guard and finish against the old
    /// definition; the next event sees the new one.
    pub fn reload_workflow(&self, workflow: WorkflowDefinition) {
        *self.workflow.write() = workflow;
    }

    fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        if let Some(existing) = self.session_locks.read().get(session_id) {
            return existing.clone();
        }
        self.session_locks.write().entry(session_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Deterministically derive this project's internal [`SessionId`] string
    /// for a CLI's platform session id, so repeated events for the same
    /// platform session resolve to the same record without a separate
    /// mapping table (spec §4.2 "not yet resolved to a SessionId").
    fn internal_session_id(&self, platform_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(platform_id.as_bytes());
        hasher.update(self.project_id.as_bytes());
        let digest = hasher.finalize();
        format!("ses-{}", hex_prefix(&digest, 6))
    }

    fn resolve_cli_source(event: &HookEvent) -> CliSource {
        match event.metadata.get("cli").and_then(Value::as_str) {
            Some("claude_code") => CliSource::ClaudeCode,
            Some("gemini") => CliSource::Gemini,
            Some("codex") => CliSource::Codex,
            _ => CliSource::Other,
        }
    }

    fn resolve_session(&self, event: &HookEvent) -> gobby_core::GobbyResult<Session> {
        let internal_id = self.internal_session_id(&event.session_id);
        if let Some(existing) = self.sessions.get(&internal_id) {
            return Ok(existing);
        }
        let session = Session::new(
            gobby_core::SessionId::from_string(internal_id),
            gobby_core::ProjectId::from_string(self.project_id.clone()),
            Self::resolve_cli_source(event),
            SystemClock.iso_now(),
        );
        self.sessions.upsert(session.clone())?;
        Ok(session)
    }

    fn current_task_json(&self, ctx: &ActionContext) -> Value {
        let claimed = ctx
            .state
            .get(&ctx.session_id)
            .and_then(|s| s.variables.get("claimed_task_id").and_then(Value::as_str).map(str::to_string));
        match claimed {
            Some(task_id) => self.tasks.get(&task_id).and_then(|t| serde_json::to_value(t).ok()).unwrap_or(Value::Null),
            None => Value::Null,
        }
    }

    /// Run one hook event through the full pipeline (spec §4.7, §4.10).
    /// Never returns an `Err` to the adapter: every failure degrades to a
    /// logged `continue` response, matching the outer try/except contract.
    pub async fn handle_event(&self, event: HookEvent) -> HookResponse {
        let internal_id = self.internal_session_id(&event.session_id);
        let lock = self.lock_for(&internal_id);
        let _guard = lock.lock().await;

        match self.dispatch(event).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "hook pipeline dispatch failed; returning continue");
                HookResponse::continue_()
            }
        }
    }

    async fn dispatch(&self, event: HookEvent) -> gobby_core::GobbyResult<HookResponse> {
        let session = self.resolve_session(&event)?;
        let event_json = serde_json::to_value(&event).unwrap_or(Value::Null);
        let tool_name = event.tool_name.clone();

        let helpers = Arc::new(SessionHelperProvider {
            session_id: session.session_id.as_str().to_string(),
            event_json: event_json.clone(),
            tasks: self.tasks.clone(),
            sessions: self.sessions.clone(),
            stop_signals: self.stop_signals.clone(),
            handoffs: self.handoffs.clone(),
            mcp_log: self.mcp_log.clone(),
        });
        let mcp = Arc::new(ProxyMcpCaller { proxy: self.proxy.clone(), session_id: session.session_id.as_str().to_string() });

        let mut ctx = ActionContext::new(
            session.session_id.as_str(),
            self.project_id.clone(),
            self.state.clone(),
            self.tasks.clone(),
            self.sessions.clone(),
            self.artifacts.clone(),
            self.stop_signals.clone(),
            self.handoffs.clone(),
            self.llm.clone(),
            mcp,
            self.chainer.clone(),
            self.autonomous.clone(),
            helpers,
        );
        ctx.event_json = event_json;
        ctx.session_json = serde_json::to_value(&session).unwrap_or(Value::Null);
        ctx.task_json = self.current_task_json(&ctx);

        // Cloned out from behind the lock rather than held across the
        // dispatch await: `parking_lot::RwLockReadGuard` isn't `Send`, and
        // this runs inside a spawned per-connection task.
        let workflow = self.workflow.read().clone();
        let input = gobby_engine::engine::DispatchInput {
            workflow: &workflow,
            rules: &self.rules,
            observers: &self.observers,
            actions: &self.actions,
            event_type: event.event_type,
            tool_name: tool_name.as_deref(),
        };
        let mut response = self.engine.dispatch(input, &mut ctx).await?;

        for handler in &self.handlers {
            if response.action == gobby_core::ResponseAction::Block {
                break;
            }
            let handled = handler.handle(&mut ctx, &event).await;
            response = response.merge(handled);
        }

        Ok(response)
    }
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(n);
    for b in bytes {
        if out.len() >= n {
            break;
        }
        let _ = write!(out, "{b:02x}");
    }
    out.truncate(n);
    out
}
