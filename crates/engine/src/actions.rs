// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action executor (spec §4.8): a registry of named verbs, each an async
//! handler of uniform signature `(context, params) -> response | error`
//! (spec §9 design note "Dynamic action registry"). `gobby-daemon` wires
//! the provider-agnostic [`LlmProvider`], [`McpCaller`], and
//! [`SessionChainer`] traits to real implementations; this crate only
//! depends on the traits, matching spec §9's "the action executor should
//! expose a provider-agnostic interface rather than hard-code any one shape."

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use gobby_core::{Clock, GobbyResult, SystemClock};
use gobby_storage::{
    ArtifactManager, HandoffManager, SessionManager, StopSignalManager, TaskManager,
    WorkflowStateRecord,
};
use gobby_wire::HookResponse;

use crate::error::EngineError;
use crate::eval::helpers::{HelperProvider, NullHelperProvider};
use crate::eval::EvalContext;
use crate::state::StateManager;
use crate::template::render;

/// Provider-agnostic LLM call (spec §4.8, §9 open question 4: "the precise
/// prompt language and schema for `call_llm` is provider-dependent").
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> GobbyResult<String>;
}

/// Null provider for tests and for daemons not configured with a real LLM.
pub struct NullLlmProvider;

#[async_trait::async_trait]
impl LlmProvider for NullLlmProvider {
    async fn complete(&self, _system_prompt: Option<&str>, _prompt: &str) -> GobbyResult<String> {
        Ok(String::new())
    }
}

/// Provider-agnostic MCP tool call, used by the `call_mcp_tool` action.
#[async_trait::async_trait]
pub trait McpCaller: Send + Sync {
    async fn call(&self, tool_name: &str, arguments: Value) -> GobbyResult<Value>;
}

pub struct NullMcpCaller;

#[async_trait::async_trait]
impl McpCaller for NullMcpCaller {
    async fn call(&self, _tool_name: &str, _arguments: Value) -> GobbyResult<Value> {
        Ok(Value::Null)
    }
}

/// Session chaining (spec §4.11 `start_new_session`): spawns a detached CLI
/// process for the same project, passing a rendered handoff as system
/// prompt, and records parent->child linkage.
#[async_trait::async_trait]
pub trait SessionChainer: Send + Sync {
    async fn start_new_session(
        &self,
        cli: &str,
        prompt: &str,
        system_prompt: &str,
        working_dir: &str,
    ) -> GobbyResult<u32>;
}

pub struct NullSessionChainer;

#[async_trait::async_trait]
impl SessionChainer for NullSessionChainer {
    async fn start_new_session(
        &self,
        _cli: &str,
        _prompt: &str,
        _system_prompt: &str,
        _working_dir: &str,
    ) -> GobbyResult<u32> {
        Ok(0)
    }
}

/// Autonomous-loop services an action can delegate to (spec §4.11); the
/// concrete registry/tracker/detector live in `gobby-daemon::autonomous`.
#[async_trait::async_trait]
pub trait AutonomousServices: Send + Sync {
    async fn record_progress(&self, session_id: &str, kind: &str);
    async fn is_stagnant(&self, session_id: &str) -> bool;
    async fn start_tracking(&self, session_id: &str);
    async fn stop_tracking(&self, session_id: &str);
}

pub struct NullAutonomousServices;

#[async_trait::async_trait]
impl AutonomousServices for NullAutonomousServices {
    async fn record_progress(&self, _session_id: &str, _kind: &str) {}
    async fn is_stagnant(&self, _session_id: &str) -> bool {
        false
    }
    async fn start_tracking(&self, _session_id: &str) {}
    async fn stop_tracking(&self, _session_id: &str) {}
}

/// Mutable, per-hook-event action context threaded through every handler
/// call in declaration order (spec §4.7 step 6: "actions can themselves
/// alter state, inject context, or return a response override").
pub struct ActionContext {
    pub session_id: String,
    pub project_id: String,
    pub state: Arc<StateManager>,
    pub tasks: Arc<TaskManager>,
    pub sessions: Arc<SessionManager>,
    pub artifacts: Arc<ArtifactManager>,
    pub stop_signals: Arc<StopSignalManager>,
    pub handoffs: Arc<HandoffManager>,
    pub llm: Arc<dyn LlmProvider>,
    pub mcp: Arc<dyn McpCaller>,
    pub chainer: Arc<dyn SessionChainer>,
    pub autonomous: Arc<dyn AutonomousServices>,
    pub helpers: Arc<dyn HelperProvider>,
    pub event_json: Value,
    pub settings_json: Value,
    pub session_json: Value,
    pub task_json: Value,
    /// Accumulated response, merged across every action this event dispatches.
    pub response: HookResponse,
    /// Tool names newly blocked by this event's actions (spec `block_tools`),
    /// consulted by the engine's step 3 permission check on later events.
    pub newly_blocked_tools: Vec<String>,
}

impl ActionContext {
    fn state_value(&self) -> Value {
        match self.state.get(&self.session_id) {
            Some(s) => serde_json::json!({
                "phase": s.phase,
                "phase_entered_at": s.phase_entered_at,
                "phase_action_count": s.phase_action_count,
                "total_action_count": s.total_action_count,
            }),
            None => Value::Null,
        }
    }

    fn variables_value(&self) -> Value {
        match self.state.get(&self.session_id) {
            Some(s) => serde_json::to_value(s.variables).unwrap_or(Value::Null),
            None => Value::Null,
        }
    }

    /// Build an [`EvalContext`] snapshot against the current state. Callers
    /// must keep the returned owned `Value`s alive for the evaluation's
    /// duration since `EvalContext` borrows from them.
    pub fn eval_values(&self) -> (Value, Value) {
        (self.state_value(), self.variables_value())
    }

    pub fn eval_ctx<'a>(&'a self, state_value: &'a Value, variables_value: &'a Value) -> EvalContext<'a> {
        EvalContext {
            event: &self.event_json,
            state: state_value,
            variables: variables_value,
            settings: &self.settings_json,
            session: &self.session_json,
            task: &self.task_json,
            helpers: self.helpers.as_ref(),
        }
    }

    fn render(&self, template: &str) -> Value {
        let (state_value, variables_value) = self.eval_values();
        let ctx = self.eval_ctx(&state_value, &variables_value);
        render(template, &ctx)
    }

    fn render_str(&self, template: &str) -> String {
        match self.render(template) {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    fn param_str(params: &Value, key: &str) -> Option<String> {
        params.get(key).and_then(Value::as_str).map(str::to_string)
    }
}

impl ActionContext {
    /// Construct a context wired to real managers and providers
    /// (`gobby-daemon`'s hook pipeline builds one per dispatched event).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        project_id: impl Into<String>,
        state: Arc<StateManager>,
        tasks: Arc<TaskManager>,
        sessions: Arc<SessionManager>,
        artifacts: Arc<ArtifactManager>,
        stop_signals: Arc<StopSignalManager>,
        handoffs: Arc<HandoffManager>,
        llm: Arc<dyn LlmProvider>,
        mcp: Arc<dyn McpCaller>,
        chainer: Arc<dyn SessionChainer>,
        autonomous: Arc<dyn AutonomousServices>,
        helpers: Arc<dyn HelperProvider>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            state,
            tasks,
            sessions,
            artifacts,
            stop_signals,
            handoffs,
            llm,
            mcp,
            chainer,
            autonomous,
            helpers,
            event_json: Value::Null,
            settings_json: Value::Null,
            session_json: Value::Null,
            task_json: Value::Null,
            response: HookResponse::continue_(),
            newly_blocked_tools: Vec::new(),
        }
    }
}

/// What one action invocation produced, beyond its mutation of `ctx.response`.
#[derive(Debug, Default, Clone)]
pub struct ActionOutcome {
    pub state: Option<WorkflowStateRecord>,
}

#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError>;
}

pub struct ActionExecutor {
    handlers: HashMap<String, Box<dyn ActionHandler>>,
}

impl ActionExecutor {
    pub fn new() -> Self {
        let mut executor = Self { handlers: HashMap::new() };
        executor.register_builtins();
        executor
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub async fn execute(&self, name: &str, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
        match self.handlers.get(name) {
            Some(handler) => handler.call(ctx, params).await,
            None => Err(EngineError::Action { action: name.to_string(), reason: "unknown action verb".to_string() }),
        }
    }

    fn register_builtins(&mut self) {
        // --- Context & messaging ---
        self.register("inject_context", Box::new(handlers::InjectContext));
        self.register("inject_message", Box::new(handlers::InjectMessage));
        self.register("switch_mode", Box::new(handlers::SwitchMode));

        // --- Artifacts ---
        self.register("capture_artifact", Box::new(handlers::CaptureArtifact));
        self.register("read_artifact", Box::new(handlers::ReadArtifact));

        // --- State ---
        self.register("set_variable", Box::new(handlers::SetVariable));
        self.register("increment_variable", Box::new(handlers::IncrementVariable));
        self.register("clear_variable", Box::new(handlers::ClearVariable));
        self.register("load_workflow_state", Box::new(handlers::LoadWorkflowState));
        self.register("save_workflow_state", Box::new(handlers::SaveWorkflowState));

        // --- Handoff ---
        self.register("generate_handoff", Box::new(handlers::GenerateHandoff));
        self.register("restore_from_handoff", Box::new(handlers::RestoreFromHandoff));
        self.register("find_parent_session", Box::new(handlers::FindParentSession));
        self.register("mark_session_status", Box::new(handlers::MarkSessionStatus));

        // --- LLM ---
        self.register("call_llm", Box::new(handlers::CallLlm));
        self.register("generate_summary", Box::new(handlers::GenerateSummary));
        self.register("synthesize_title", Box::new(handlers::SynthesizeTitle));

        // --- Tasks ---
        self.register("persist_tasks", Box::new(handlers::PersistTasks));
        self.register("write_todos", Box::new(handlers::WriteTodos));
        self.register("mark_todo_complete", Box::new(handlers::MarkTodoComplete));
        self.register("close_task", Box::new(handlers::CloseTask));
        self.register("start_new_session", Box::new(handlers::StartNewSession));

        // --- MCP ---
        self.register("call_mcp_tool", Box::new(handlers::CallMcpTool));

        // --- Enforcement ---
        self.register("block_tools", Box::new(handlers::BlockTools));
        self.register("require_task_complete", Box::new(handlers::RequireTaskComplete));
        self.register("require_commit_before_stop", Box::new(handlers::RequireCommitBeforeStop));
        self.register("validate_session_task_scope", Box::new(handlers::ValidateSessionTaskScope));
        self.register("capture_baseline_dirty_files", Box::new(handlers::CaptureBaselineDirtyFiles));

        // --- Autonomous ---
        self.register("check_stop_signal", Box::new(handlers::CheckStopSignal));
        self.register("clear_stop_signal", Box::new(handlers::ClearStopSignal));
        self.register("start_progress_tracking", Box::new(handlers::StartProgressTracking));
        self.register("stop_progress_tracking", Box::new(handlers::StopProgressTracking));
        self.register("record_progress", Box::new(handlers::RecordProgress));
        self.register("check_stuck", Box::new(handlers::CheckStuck));
        self.register("handle_stuck", Box::new(handlers::HandleStuck));
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit struct per action verb (spec §4.8), each a narrow
/// [`ActionHandler`] impl — mirrors the teacher's one-file-per-job-kind
/// executor shape, generalized to an in-process registry instead of a
/// dispatch-by-name-string `match`.
mod handlers {
    use super::*;

    pub struct InjectContext;
    #[async_trait::async_trait]
    impl ActionHandler for InjectContext {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let template = ActionContext::param_str(params, "context").unwrap_or_default();
            let rendered = ctx.render_str(&template);
            ctx.response = ctx.response.clone().merge(HookResponse::modify(rendered));
            Ok(ActionOutcome::default())
        }
    }

    pub struct InjectMessage;
    #[async_trait::async_trait]
    impl ActionHandler for InjectMessage {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let template = ActionContext::param_str(params, "message").unwrap_or_default();
            let rendered = ctx.render_str(&template);
            ctx.response = ctx.response.clone().merge(HookResponse::modify(rendered));
            Ok(ActionOutcome::default())
        }
    }

    pub struct SwitchMode;
    #[async_trait::async_trait]
    impl ActionHandler for SwitchMode {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let mode = ActionContext::param_str(params, "mode").unwrap_or_default();
            let state = ctx.state.set_variable(&ctx.session_id, "mode", Value::String(mode))?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct CaptureArtifact;
    #[async_trait::async_trait]
    impl ActionHandler for CaptureArtifact {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let name = ActionContext::param_str(params, "name").unwrap_or_default();
            let template = ActionContext::param_str(params, "content").unwrap_or_default();
            let content = ctx.render_str(&template);
            let state = ctx.state.capture_artifact(&ctx.session_id, &name, content)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct ReadArtifact;
    #[async_trait::async_trait]
    impl ActionHandler for ReadArtifact {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let name = ActionContext::param_str(params, "name").unwrap_or_default();
            let as_var = ActionContext::param_str(params, "as").unwrap_or_else(|| "artifact_content".to_string());
            let content = ctx.state.read_artifact(&ctx.session_id, &name).unwrap_or_default();
            let state = ctx.state.set_variable(&ctx.session_id, &as_var, Value::String(content))?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct SetVariable;
    #[async_trait::async_trait]
    impl ActionHandler for SetVariable {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let name = ActionContext::param_str(params, "name").unwrap_or_default();
            let value = match params.get("value") {
                Some(Value::String(s)) => ctx.render(s),
                Some(other) => other.clone(),
                None => Value::Null,
            };
            let state = ctx.state.set_variable(&ctx.session_id, &name, value)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct IncrementVariable;
    #[async_trait::async_trait]
    impl ActionHandler for IncrementVariable {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let name = ActionContext::param_str(params, "name").unwrap_or_default();
            let by = params.get("by").and_then(Value::as_f64).unwrap_or(1.0);
            let state = ctx.state.increment_variable(&ctx.session_id, &name, by)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct ClearVariable;
    #[async_trait::async_trait]
    impl ActionHandler for ClearVariable {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let name = ActionContext::param_str(params, "name").unwrap_or_default();
            let state = ctx.state.clear_variable(&ctx.session_id, &name)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct LoadWorkflowState;
    #[async_trait::async_trait]
    impl ActionHandler for LoadWorkflowState {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            // Force a cache refresh from durable storage (see StateManager::get).
            let state = ctx.state.get(&ctx.session_id);
            Ok(ActionOutcome { state })
        }
    }

    pub struct SaveWorkflowState;
    #[async_trait::async_trait]
    impl ActionHandler for SaveWorkflowState {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            // StateManager write-throughs every mutation already; this is an
            // explicit flush point for actions that only want to guarantee
            // durability before a risky next step.
            let state = ctx.state.exit_phase(&ctx.session_id)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct GenerateHandoff;
    #[async_trait::async_trait]
    impl ActionHandler for GenerateHandoff {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let template = ActionContext::param_str(params, "content").unwrap_or_else(|| {
                "Active task: {{ variables.active_task_id }}. Goal: {{ variables.goal }}.".to_string()
            });
            let content = ctx.render_str(&template);
            ctx.handoffs.store(gobby_storage::WorkflowHandoff {
                session_id: ctx.session_id.clone(),
                content,
                created_at: SystemClock.iso_now(),
            })?;
            Ok(ActionOutcome::default())
        }
    }

    pub struct RestoreFromHandoff;
    #[async_trait::async_trait]
    impl ActionHandler for RestoreFromHandoff {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            if let Some(handoff) = ctx.handoffs.consume(&ctx.session_id)? {
                ctx.response = ctx.response.clone().merge(HookResponse::modify(handoff.content));
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct FindParentSession;
    #[async_trait::async_trait]
    impl ActionHandler for FindParentSession {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let parent_id = ActionContext::param_str(params, "parent_session_id").unwrap_or_default();
            if let Some(parent) = ctx.sessions.get(&parent_id) {
                let state = ctx.state.set_variable(
                    &ctx.session_id,
                    "parent_session_found",
                    Value::String(parent.session_id.as_str().to_string()),
                )?;
                return Ok(ActionOutcome { state: Some(state) });
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct MarkSessionStatus;
    #[async_trait::async_trait]
    impl ActionHandler for MarkSessionStatus {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let status_name = ActionContext::param_str(params, "status").unwrap_or_default();
            if let Some(mut session) = ctx.sessions.get(&ctx.session_id) {
                let next = match status_name.as_str() {
                    "handoff_ready" => gobby_core::SessionStatus::HandoffReady,
                    "expired" => gobby_core::SessionStatus::Expired,
                    "terminated" => gobby_core::SessionStatus::Terminated,
                    _ => gobby_core::SessionStatus::Active,
                };
                session.transition(next).map_err(|e| EngineError::Action {
                    action: "mark_session_status".into(),
                    reason: e.to_string(),
                })?;
                ctx.sessions.upsert(session)?;
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct CallLlm;
    #[async_trait::async_trait]
    impl ActionHandler for CallLlm {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let prompt_tpl = ActionContext::param_str(params, "prompt").unwrap_or_default();
            let system_tpl = ActionContext::param_str(params, "system_prompt");
            let prompt = ctx.render_str(&prompt_tpl);
            let system = system_tpl.map(|s| ctx.render_str(&s));
            let result = ctx.llm.complete(system.as_deref(), &prompt).await?;
            let as_var = ActionContext::param_str(params, "as").unwrap_or_else(|| "llm_result".to_string());
            let state = ctx.state.set_variable(&ctx.session_id, &as_var, Value::String(result))?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct GenerateSummary;
    #[async_trait::async_trait]
    impl ActionHandler for GenerateSummary {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let transcript_var = ActionContext::param_str(params, "from").unwrap_or_else(|| "transcript".to_string());
            let transcript = ctx
                .state
                .get(&ctx.session_id)
                .and_then(|s| s.variables.get(&transcript_var).and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            let summary =
                ctx.llm.complete(Some("Summarize this coding session in two sentences."), &transcript).await?;
            if let Some(mut session) = ctx.sessions.get(&ctx.session_id) {
                session.summary = Some(summary);
                ctx.sessions.upsert(session)?;
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct SynthesizeTitle;
    #[async_trait::async_trait]
    impl ActionHandler for SynthesizeTitle {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let prompt_var = ActionContext::param_str(params, "from").unwrap_or_else(|| "prompt_text".to_string());
            let seed = ctx
                .state
                .get(&ctx.session_id)
                .and_then(|s| s.variables.get(&prompt_var).and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            let title = ctx.llm.complete(Some("Give a five-word title for this task."), &seed).await?;
            if let Some(mut session) = ctx.sessions.get(&ctx.session_id) {
                if session.title.is_none() {
                    session.title = Some(title);
                    ctx.sessions.upsert(session)?;
                }
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct PersistTasks;
    #[async_trait::async_trait]
    impl ActionHandler for PersistTasks {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let titles: Vec<String> = params
                .get("titles")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            for title in titles {
                ctx.tasks.create(&ctx.project_id, title, gobby_core::TaskType::Task, 2)?;
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct WriteTodos;
    #[async_trait::async_trait]
    impl ActionHandler for WriteTodos {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let todos = params.get("todos").cloned().unwrap_or(Value::Array(vec![]));
            let state = ctx.state.set_variable(&ctx.session_id, "todo_state", todos)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct MarkTodoComplete;
    #[async_trait::async_trait]
    impl ActionHandler for MarkTodoComplete {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let index = params.get("index").and_then(Value::as_u64);
            let mut todos = ctx
                .state
                .get(&ctx.session_id)
                .and_then(|s| s.variables.get("todo_state").cloned())
                .unwrap_or(Value::Array(vec![]));
            if let (Some(idx), Value::Array(items)) = (index, &mut todos) {
                if let Some(item) = items.get_mut(idx as usize) {
                    if let Value::Object(map) = item {
                        map.insert("status".to_string(), Value::String("completed".to_string()));
                    }
                }
            }
            let state = ctx.state.set_variable(&ctx.session_id, "todo_state", todos)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct CloseTask;
    #[async_trait::async_trait]
    impl ActionHandler for CloseTask {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let task_id = ActionContext::param_str(params, "task_id").unwrap_or_default();
            let skip_validation = params.get("skip_validation").and_then(Value::as_bool).unwrap_or(false);
            ctx.tasks.transition(&task_id, gobby_core::TaskStatus::Closed, skip_validation)?;
            Ok(ActionOutcome::default())
        }
    }

    pub struct StartNewSession;
    #[async_trait::async_trait]
    impl ActionHandler for StartNewSession {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let cli = ActionContext::param_str(params, "cli").unwrap_or_else(|| "claude".to_string());
            let prompt_tpl = ActionContext::param_str(params, "prompt").unwrap_or_default();
            let working_dir = ActionContext::param_str(params, "working_dir").unwrap_or_else(|| ".".to_string());
            let system_prompt = ctx.handoffs.peek(&ctx.session_id).map(|h| h.content).unwrap_or_default();
            let prompt = ctx.render_str(&prompt_tpl);
            ctx.chainer.start_new_session(&cli, &prompt, &system_prompt, &working_dir).await?;
            Ok(ActionOutcome::default())
        }
    }

    pub struct CallMcpTool;
    #[async_trait::async_trait]
    impl ActionHandler for CallMcpTool {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let tool_name = ActionContext::param_str(params, "tool_name").unwrap_or_default();
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            let result = ctx.mcp.call(&tool_name, arguments).await?;
            let as_var = ActionContext::param_str(params, "as").unwrap_or_else(|| "mcp_result".to_string());
            let state = ctx.state.set_variable(&ctx.session_id, &as_var, result)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct BlockTools;
    #[async_trait::async_trait]
    impl ActionHandler for BlockTools {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let tools: Vec<String> = params
                .get("tools")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            ctx.newly_blocked_tools.extend(tools);
            Ok(ActionOutcome::default())
        }
    }

    pub struct RequireTaskComplete;
    #[async_trait::async_trait]
    impl ActionHandler for RequireTaskComplete {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let task_id = ActionContext::param_str(params, "task_id").unwrap_or_default();
            if !ctx.helpers.task_tree_complete(&task_id) {
                let reason = ActionContext::param_str(params, "reason")
                    .unwrap_or_else(|| format!("task {task_id} is not yet complete"));
                ctx.response = ctx.response.clone().merge(HookResponse::block(reason));
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct RequireCommitBeforeStop;
    #[async_trait::async_trait]
    impl ActionHandler for RequireCommitBeforeStop {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let dirty = ctx
                .state
                .get(&ctx.session_id)
                .and_then(|s| s.variables.get("baseline_dirty_files").cloned())
                .unwrap_or(Value::Array(vec![]));
            if matches!(&dirty, Value::Array(a) if !a.is_empty()) {
                let reason = ActionContext::param_str(params, "reason")
                    .unwrap_or_else(|| "uncommitted changes remain; commit before stopping".to_string());
                ctx.response = ctx.response.clone().merge(HookResponse::block(reason));
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct ValidateSessionTaskScope;
    #[async_trait::async_trait]
    impl ActionHandler for ValidateSessionTaskScope {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let allowed_prefix =
                ActionContext::param_str(params, "project_id").unwrap_or_else(|| ctx.project_id.clone());
            if let Some(task_id) = ctx.task_json.get("project_id").and_then(Value::as_str) {
                if task_id != allowed_prefix {
                    ctx.response = ctx
                        .response
                        .clone()
                        .merge(HookResponse::block("task does not belong to this session's project"));
                }
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct CaptureBaselineDirtyFiles;
    #[async_trait::async_trait]
    impl ActionHandler for CaptureBaselineDirtyFiles {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let files = params.get("files").cloned().unwrap_or(Value::Array(vec![]));
            let state = ctx.state.set_variable(&ctx.session_id, "baseline_dirty_files", files)?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct CheckStopSignal;
    #[async_trait::async_trait]
    impl ActionHandler for CheckStopSignal {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            if let Some(signal) = ctx.stop_signals.peek(&ctx.session_id) {
                let message = ActionContext::param_str(params, "message")
                    .unwrap_or_else(|| format!("stop requested: {}", signal.reason));
                ctx.response = ctx.response.clone().merge(HookResponse::block(message));
            }
            Ok(ActionOutcome::default())
        }
    }

    pub struct ClearStopSignal;
    #[async_trait::async_trait]
    impl ActionHandler for ClearStopSignal {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            ctx.stop_signals.consume(&ctx.session_id)?;
            Ok(ActionOutcome::default())
        }
    }

    pub struct StartProgressTracking;
    #[async_trait::async_trait]
    impl ActionHandler for StartProgressTracking {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            ctx.autonomous.start_tracking(&ctx.session_id).await;
            Ok(ActionOutcome::default())
        }
    }

    pub struct StopProgressTracking;
    #[async_trait::async_trait]
    impl ActionHandler for StopProgressTracking {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            ctx.autonomous.stop_tracking(&ctx.session_id).await;
            Ok(ActionOutcome::default())
        }
    }

    pub struct RecordProgress;
    #[async_trait::async_trait]
    impl ActionHandler for RecordProgress {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let kind = ActionContext::param_str(params, "kind").unwrap_or_else(|| "step".to_string());
            ctx.autonomous.record_progress(&ctx.session_id, &kind).await;
            Ok(ActionOutcome::default())
        }
    }

    pub struct CheckStuck;
    #[async_trait::async_trait]
    impl ActionHandler for CheckStuck {
        async fn call(&self, ctx: &mut ActionContext, _params: &Value) -> Result<ActionOutcome, EngineError> {
            let stagnant = ctx.autonomous.is_stagnant(&ctx.session_id).await;
            let state = ctx.state.set_variable(&ctx.session_id, "is_stagnant", Value::Bool(stagnant))?;
            Ok(ActionOutcome { state: Some(state) })
        }
    }

    pub struct HandleStuck;
    #[async_trait::async_trait]
    impl ActionHandler for HandleStuck {
        async fn call(&self, ctx: &mut ActionContext, params: &Value) -> Result<ActionOutcome, EngineError> {
            let reflection = ActionContext::param_str(params, "reflection")
                .unwrap_or_else(|| "Progress has stalled; reassess the plan before continuing.".to_string());
            let rendered = ctx.render_str(&reflection);
            ctx.response = ctx.response.clone().merge(HookResponse::modify(rendered));
            Ok(ActionOutcome::default())
        }
    }
}
