// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP proxy manager (spec §4.9): fans out one client-facing MCP endpoint
//! across many upstream servers, registers internal registries as virtual
//! servers handled in-process against storage, and filters the announced
//! catalog against the active workflow phase.
//!
//! Transports: a real upstream is either spawned over stdio or dialed over
//! TCP, both framed with `gobby_wire`'s length-prefixed JSON (spec §6 "stdio
//! or streamable HTTP transports" — the teacher hand-rolls one framing
//! layer for every byte stream rather than pulling in a JSON-RPC or HTTP
//! client crate, so "streamable HTTP" here is the same framing over a
//! socket; noted as a simplification in `DESIGN.md`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use gobby_core::{GobbyError, GobbyResult};
use gobby_engine::actions::McpCaller;
use gobby_wire::{read_json, write_json, McpCallRequest, McpCallResponse, McpToolSpec};
use gobby_workflow::{Phase, WorkflowDefinition};

use crate::config::McpServerConfig;
use crate::helpers::{McpCallLog, McpCallRecord};

/// Per-upstream connection state (spec §4.9 "Lifecycle").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
    Idle,
    Connecting,
    Ready,
    Degraded,
    Closed,
}

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

enum Transport {
    Stdio { child: Child, stdin: BufWriter<ChildStdin>, stdout: BufReader<ChildStdout> },
    Tcp { stream: BufReader<TcpStream> },
}

impl Transport {
    async fn roundtrip(&mut self, request: &McpCallRequest) -> Result<McpCallResponse, std::io::Error> {
        match self {
            Transport::Stdio { stdin, stdout, .. } => {
                write_json(stdin, request).await.map_err(to_io)?;
                read_json(stdout).await.map_err(to_io)
            }
            Transport::Tcp { stream } => {
                write_json(stream, request).await.map_err(to_io)?;
                read_json(stream).await.map_err(to_io)
            }
        }
    }
}

fn to_io(e: gobby_wire::ProtocolError) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// One upstream MCP server's connection, catalog, and lifecycle state.
struct Upstream {
    name: String,
    config: McpServerConfig,
    state: RwLock<UpstreamState>,
    /// Last-known catalog, kept even while `degraded` (spec §4.9 "A
    /// `degraded` server still reports its last-known catalog but returns
    /// an error for tool calls until ready").
    catalog: RwLock<Vec<McpToolSpec>>,
    /// Bumped every successful reconnect; a fresh generation invalidates
    /// any in-flight assumption about the prior catalog (spec §5 "The MCP
    /// catalog is immutable once built for a given connection generation").
    generation: AtomicU64,
    transport: AsyncMutex<Option<Transport>>,
    backoff: RwLock<Duration>,
}

impl Upstream {
    fn new(config: McpServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            config,
            state: RwLock::new(UpstreamState::Idle),
            catalog: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            transport: AsyncMutex::new(None),
            backoff: RwLock::new(INITIAL_BACKOFF),
        }
    }

    fn state(&self) -> UpstreamState {
        *self.state.read()
    }

    fn set_state(&self, state: UpstreamState) {
        *self.state.write() = state;
    }

    async fn dial(&self) -> Result<Transport, std::io::Error> {
        if let Some(command) = &self.config.command {
            let mut cmd = Command::new(command);
            cmd.args(&self.config.args);
            cmd.stdin(std::process::Stdio::piped());
            cmd.stdout(std::process::Stdio::piped());
            cmd.stderr(std::process::Stdio::null());
            let mut child = cmd.spawn()?;
            let stdin = child.stdin.take().ok_or_else(|| std::io::Error::other("no stdin"))?;
            let stdout = child.stdout.take().ok_or_else(|| std::io::Error::other("no stdout"))?;
            Ok(Transport::Stdio { child, stdin: BufWriter::new(stdin), stdout: BufReader::new(stdout) })
        } else if let Some(url) = &self.config.url {
            let addr = url.trim_start_matches("tcp://");
            let stream = TcpStream::connect(addr).await?;
            Ok(Transport::Tcp { stream: BufReader::new(stream) })
        } else {
            Err(std::io::Error::other("mcp server config has neither command nor url"))
        }
    }

    /// Connect (or reconnect) and refresh the catalog. On failure, backs
    /// off exponentially and marks the server `degraded` rather than
    /// dropping its last-known catalog (spec §4.9).
    async fn connect(&self) {
        self.set_state(UpstreamState::Connecting);
        match self.dial().await {
            Ok(mut transport) => {
                let discover = McpCallRequest { tool_name: "__discover__".into(), arguments: Value::Null };
                match transport.roundtrip(&discover).await {
                    Ok(McpCallResponse::Ok { result }) => {
                        let tools: Vec<McpToolSpec> = serde_json::from_value(result).unwrap_or_default();
                        *self.catalog.write() = tools;
                        *self.transport.lock().await = Some(transport);
                        self.generation.fetch_add(1, Ordering::SeqCst);
                        *self.backoff.write() = INITIAL_BACKOFF;
                        self.set_state(UpstreamState::Ready);
                        info!(server = %self.name, "mcp upstream ready");
                    }
                    _ => self.degrade("discovery call failed").await,
                }
            }
            Err(e) => self.degrade(&e.to_string()).await,
        }
    }

    async fn degrade(&self, reason: &str) {
        warn!(server = %self.name, reason, "mcp upstream degraded");
        *self.transport.lock().await = None;
        self.set_state(UpstreamState::Degraded);
        let backoff = {
            let mut b = self.backoff.write();
            *b = (*b * 2).min(MAX_BACKOFF);
            *b
        };
        let _ = backoff;
    }

    fn next_backoff(&self) -> Duration {
        *self.backoff.read()
    }

    async fn call(&self, tool_name: &str, arguments: Value) -> Result<McpCallResponse, GobbyError> {
        if self.state() != UpstreamState::Ready {
            return Err(GobbyError::UpstreamUnavailable {
                reason: format!("server '{}' is {:?}", self.name, self.state()),
            });
        }
        let request = McpCallRequest { tool_name: tool_name.to_string(), arguments };
        let mut guard = self.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            drop(guard);
            self.degrade("transport missing while ready").await;
            return Err(GobbyError::UpstreamUnavailable { reason: format!("server '{}' has no live transport", self.name) });
        };
        match transport.roundtrip(&request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                drop(guard);
                self.degrade(&e.to_string()).await;
                Err(GobbyError::UpstreamUnavailable { reason: format!("connection to '{}' lost: {e}", self.name) })
            }
        }
    }
}

/// An in-process virtual MCP server, handled directly against storage
/// (spec §4.9 "Internal registries"). Never escalates storage errors as
/// MCP-protocol errors — always a structured `{status, error}` payload.
#[async_trait]
pub trait InternalRegistry: Send + Sync {
    fn name(&self) -> &str;
    fn catalog(&self) -> Vec<McpToolSpec>;
    async fn call(&self, tool_name: &str, arguments: Value) -> McpCallResponse;
}

/// A registry with a declared catalog but no implemented tools yet — used
/// for the extension-point registries spec §1 places out of core scope
/// (memory, skills, worktrees, merge, metrics, hub mirror, GitHub, Linear).
/// It still announces its name as a virtual server so the catalog shape is
/// stable for clients; every call returns a structured "not available" error.
pub struct StubRegistry {
    name: String,
}

impl StubRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl InternalRegistry for StubRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn catalog(&self) -> Vec<McpToolSpec> {
        Vec::new()
    }

    async fn call(&self, tool_name: &str, _arguments: Value) -> McpCallResponse {
        McpCallResponse::Error {
            error: format!("'{}' is not installed in this daemon build", self.name),
            kind: "not_found".to_string(),
        }
    }
}

/// Routes a client-facing tool call to the owning upstream or internal
/// registry, and filters the announced catalog against the active
/// workflow phase (spec §4.9).
pub struct ProxyManager {
    upstreams: HashMap<String, Arc<Upstream>>,
    internal: HashMap<String, Arc<dyn InternalRegistry>>,
    /// `announced tool name -> owning server name`, rebuilt on every
    /// catalog refresh (spec §4.9 "Request routing").
    routes: RwLock<HashMap<String, String>>,
    mcp_log: Arc<McpCallLog>,
}

/// Announced tool names are prefixed by server so two upstreams can both
/// expose a tool called e.g. `search` without colliding.
fn announced_name(server: &str, tool: &str) -> String {
    format!("{server}__{tool}")
}

impl ProxyManager {
    pub fn new(configs: Vec<McpServerConfig>, internal: Vec<Arc<dyn InternalRegistry>>, mcp_log: Arc<McpCallLog>) -> Self {
        let upstreams = configs.into_iter().map(|c| (c.name.clone(), Arc::new(Upstream::new(c)))).collect();
        let internal = internal.into_iter().map(|r| (r.name().to_string(), r)).collect();
        Self { upstreams, internal, routes: RwLock::new(HashMap::new()), mcp_log }
    }

    /// Dial every configured upstream (spec §4.9 "On startup ... it ...
    /// establishes connections ... and indexes their tool catalogs").
    /// Internal registries need no dialing; they're always present.
    pub async fn connect_all(&self) {
        for upstream in self.upstreams.values() {
            upstream.connect().await;
        }
        self.rebuild_routes();
    }

    /// Retry every non-`ready` upstream once, honoring its own backoff
    /// (spec §4.9 "Connection failures back off exponentially"). Intended
    /// to be called from a periodic background tick.
    pub async fn retry_degraded(&self) {
        for upstream in self.upstreams.values() {
            if matches!(upstream.state(), UpstreamState::Degraded | UpstreamState::Idle) {
                tokio::time::sleep(upstream.next_backoff().min(Duration::from_millis(50))).await;
                upstream.connect().await;
            }
        }
        self.rebuild_routes();
    }

    fn rebuild_routes(&self) {
        let mut routes = HashMap::new();
        for upstream in self.upstreams.values() {
            for tool in upstream.catalog.read().iter() {
                routes.insert(announced_name(&upstream.name, &tool.name), upstream.name.clone());
            }
        }
        for registry in self.internal.values() {
            for tool in registry.catalog() {
                routes.insert(announced_name(registry.name(), &tool.name), registry.name().to_string());
            }
        }
        *self.routes.write() = routes;
    }

    /// The full catalog, with names prefixed by owning server (spec §4.9
    /// "Request routing ... carry a server prefix").
    pub fn full_catalog(&self) -> Vec<McpToolSpec> {
        let mut out = Vec::new();
        for upstream in self.upstreams.values() {
            for tool in upstream.catalog.read().iter() {
                out.push(McpToolSpec {
                    name: announced_name(&upstream.name, &tool.name),
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.clone(),
                });
            }
        }
        for registry in self.internal.values() {
            for tool in registry.catalog() {
                out.push(McpToolSpec {
                    name: announced_name(registry.name(), &tool.name),
                    description: tool.description,
                    input_schema: tool.input_schema,
                });
            }
        }
        out
    }

    /// Catalog filtered by the active workflow phase (spec §4.9 "Tool
    /// filtering"): a tool absent from `allowed_tools` (when not `"all"`),
    /// or present in `blocked_tools`, is removed.
    pub fn catalog_for_phase(&self, workflow: Option<&WorkflowDefinition>, phase_name: Option<&str>) -> Vec<McpToolSpec> {
        let phase: Option<&Phase> = workflow.zip(phase_name).and_then(|(w, name)| w.phase(name));
        let Some(phase) = phase else { return self.full_catalog() };
        self.full_catalog().into_iter().filter(|tool| phase.tool_permitted(&tool.name)).collect()
    }

    /// Route one call by its announced (prefixed) name.
    pub async fn call(&self, announced: &str, arguments: Value) -> McpCallResponse {
        let Some(server) = self.routes.read().get(announced).cloned() else {
            return McpCallResponse::error(&GobbyError::not_found(format!("unknown tool '{announced}'")));
        };
        let tool_name = announced.strip_prefix(&format!("{server}__")).unwrap_or(announced);

        if let Some(registry) = self.internal.get(&server) {
            return registry.call(tool_name, arguments).await;
        }
        match self.upstreams.get(&server) {
            Some(upstream) => match upstream.call(tool_name, arguments).await {
                Ok(response) => response,
                Err(e) => McpCallResponse::error(&e),
            },
            None => McpCallResponse::error(&GobbyError::not_found(format!("server '{server}' not registered"))),
        }
    }

    /// Record the call's outcome into the per-session MCP call log so the
    /// `mcp_called`/`mcp_result_*` helpers can answer for later events
    /// (spec §4.4 "mcp_call_tracking").
    pub fn record(&self, session_id: &str, server: &str, tool: &str, response: &McpCallResponse) {
        let (result, failed) = match response {
            McpCallResponse::Ok { result } => (result.clone(), false),
            McpCallResponse::Error { .. } => (Value::Null, true),
        };
        self.mcp_log.record(session_id, McpCallRecord { server: server.to_string(), tool: tool.to_string(), result, failed });
    }
}

/// Adapts [`ProxyManager`] to the provider-agnostic [`McpCaller`] trait the
/// action executor's `call_mcp_tool` handler depends on (spec §4.8, §9).
pub struct ProxyMcpCaller {
    pub proxy: Arc<ProxyManager>,
    pub session_id: String,
}

#[async_trait]
impl McpCaller for ProxyMcpCaller {
    async fn call(&self, tool_name: &str, arguments: Value) -> GobbyResult<Value> {
        let response = self.proxy.call(tool_name, arguments).await;
        let server = tool_name.split_once("__").map(|(s, _)| s).unwrap_or("unknown");
        let short = tool_name.split_once("__").map(|(_, t)| t).unwrap_or(tool_name);
        self.proxy.record(&self.session_id, server, short, &response);
        match response {
            McpCallResponse::Ok { result } => Ok(result),
            McpCallResponse::Error { error, kind } => Err(match kind.as_str() {
                "upstream_unavailable" => GobbyError::UpstreamUnavailable { reason: error },
                "not_found" => GobbyError::NotFound { reason: error },
                _ => GobbyError::ActionError { action: "call_mcp_tool".into(), reason: error },
            }),
        }
    }
}

/// The internal registries always present regardless of `mcp_servers:`
/// config (spec §4.9): task/session/workflow management plus the
/// out-of-scope extension points, stubbed so the catalog shape is stable.
pub fn builtin_registry_names() -> &'static [&'static str] {
    &[
        "gobby-workflows",
        "gobby-memory",
        "gobby-skills",
        "gobby-worktrees",
        "gobby-merge",
        "gobby-metrics",
        "gobby-hub",
        "gobby-github",
        "gobby-linear",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announced_name_prefixes_with_server() {
        assert_eq!(announced_name("gobby-tasks", "list_tasks"), "gobby-tasks__list_tasks");
    }

    #[tokio::test]
    async fn stub_registry_reports_structured_not_found() {
        let registry = StubRegistry::new("gobby-memory");
        let response = registry.call("search", Value::Null).await;
        match response {
            McpCallResponse::Error { kind, .. } => assert_eq!(kind, "not_found"),
            _ => panic!("expected structured error"),
        }
    }

    #[test]
    fn unconnected_upstream_is_idle() {
        let upstream = Upstream::new(McpServerConfig { name: "x".into(), command: None, args: vec![], url: None });
        assert_eq!(upstream.state(), UpstreamState::Idle);
    }

    #[tokio::test]
    async fn routing_unknown_tool_returns_not_found() {
        let log = Arc::new(McpCallLog::new());
        let proxy = ProxyManager::new(vec![], vec![], log);
        let response = proxy.call("no-such-tool", Value::Null).await;
        match response {
            McpCallResponse::Error { kind, .. } => assert_eq!(kind, "not_found"),
            _ => panic!("expected not_found"),
        }
    }
}
