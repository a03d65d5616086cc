// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two internal registries the proxy always wires against real storage
//! rather than stubbing out (spec §4.9 "Internal registries" supplement):
//! `gobby-tasks` and `gobby-sessions`. Every other built-in name
//! (`gobby-workflows`, memory, skills, worktrees, merge, metrics, hub,
//! GitHub, Linear) is out of core scope and stays a [`StubRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use gobby_core::{DepType, GobbyError, Task, TaskDependency, TaskId, TaskStatus, TaskType};
use gobby_storage::{SessionManager, TaskManager};
use gobby_wire::{McpCallResponse, McpToolSpec};

use crate::mcp_proxy::InternalRegistry;

fn schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn param_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn parse_task_type(raw: Option<&str>) -> TaskType {
    match raw {
        Some("bug") => TaskType::Bug,
        Some("epic") => TaskType::Epic,
        Some("chore") => TaskType::Chore,
        Some("feature") => TaskType::Feature,
        _ => TaskType::Task,
    }
}

fn parse_status(raw: Option<&str>) -> Option<TaskStatus> {
    match raw {
        Some("open") => Some(TaskStatus::Open),
        Some("in_progress") => Some(TaskStatus::InProgress),
        Some("closed") => Some(TaskStatus::Closed),
        Some("escalated") => Some(TaskStatus::Escalated),
        _ => None,
    }
}

fn parse_dep_type(raw: Option<&str>) -> DepType {
    match raw {
        Some("related") => DepType::Related,
        Some("discovered-from") | Some("discovered_from") => DepType::DiscoveredFrom,
        _ => DepType::Blocks,
    }
}

/// The task-management tool surface exposed to workflow actions and LLM
/// callers alike via the same MCP proxy path (spec §4.9; spec §3 `Task`).
pub struct TasksRegistry {
    project_id: String,
    tasks: Arc<TaskManager>,
}

impl TasksRegistry {
    pub fn new(project_id: impl Into<String>, tasks: Arc<TaskManager>) -> Self {
        Self { project_id: project_id.into(), tasks }
    }

    fn list(&self, arguments: Value) -> McpCallResponse {
        let status = parse_status(param_str(&arguments, "status"));
        let tasks = self.tasks.list(&self.project_id, status);
        McpCallResponse::ok(serde_json::to_value(tasks).unwrap_or(Value::Null))
    }

    fn list_ready(&self) -> McpCallResponse {
        let tasks = self.tasks.list_ready(&self.project_id);
        McpCallResponse::ok(serde_json::to_value(tasks).unwrap_or(Value::Null))
    }

    fn get(&self, arguments: Value) -> McpCallResponse {
        let Some(id) = param_str(&arguments, "task_id") else {
            return McpCallResponse::error(&GobbyError::invalid("missing task_id"));
        };
        match self.tasks.get(id) {
            Some(task) => McpCallResponse::ok(serde_json::to_value(task).unwrap_or(Value::Null)),
            None => McpCallResponse::error(&GobbyError::not_found(format!("task {id}"))),
        }
    }

    fn create(&self, arguments: Value) -> McpCallResponse {
        let Some(title) = param_str(&arguments, "title") else {
            return McpCallResponse::error(&GobbyError::invalid("missing title"));
        };
        let task_type = parse_task_type(param_str(&arguments, "task_type"));
        let priority = arguments.get("priority").and_then(Value::as_u64).unwrap_or(2) as u8;
        match self.tasks.create(&self.project_id, title, task_type, priority) {
            Ok(task) => McpCallResponse::ok(serde_json::to_value(task).unwrap_or(Value::Null)),
            Err(e) => McpCallResponse::error(&e),
        }
    }

    fn transition(&self, arguments: Value, next: TaskStatus) -> McpCallResponse {
        let Some(id) = param_str(&arguments, "task_id") else {
            return McpCallResponse::error(&GobbyError::invalid("missing task_id"));
        };
        let skip_validation = arguments.get("skip_validation").and_then(Value::as_bool).unwrap_or(false);
        match self.tasks.transition(id, next, skip_validation) {
            Ok(task) => McpCallResponse::ok(serde_json::to_value(task).unwrap_or(Value::Null)),
            Err(e) => McpCallResponse::error(&e),
        }
    }

    fn add_dependency(&self, arguments: Value) -> McpCallResponse {
        let (Some(from), Some(to)) = (param_str(&arguments, "from"), param_str(&arguments, "to")) else {
            return McpCallResponse::error(&GobbyError::invalid("missing from/to"));
        };
        let dep = TaskDependency {
            from: TaskId::from_string(from),
            to: TaskId::from_string(to),
            dep_type: parse_dep_type(param_str(&arguments, "dep_type")),
        };
        match self.tasks.add_dependency(dep) {
            Ok(()) => McpCallResponse::ok(Value::Bool(true)),
            Err(e) => McpCallResponse::error(&e),
        }
    }
}

#[async_trait]
impl InternalRegistry for TasksRegistry {
    fn name(&self) -> &str {
        "gobby-tasks"
    }

    fn catalog(&self) -> Vec<McpToolSpec> {
        vec![
            McpToolSpec {
                name: "list_tasks".into(),
                description: "List tasks in the current project, optionally filtered by status".into(),
                input_schema: schema(serde_json::json!({"status": {"type": "string"}}), &[]),
            },
            McpToolSpec {
                name: "list_ready_tasks".into(),
                description: "List open tasks with no outstanding blocking dependency".into(),
                input_schema: schema(serde_json::json!({}), &[]),
            },
            McpToolSpec {
                name: "get_task".into(),
                description: "Fetch one task by id or unique prefix".into(),
                input_schema: schema(serde_json::json!({"task_id": {"type": "string"}}), &["task_id"]),
            },
            McpToolSpec {
                name: "create_task".into(),
                description: "Create a new task".into(),
                input_schema: schema(
                    serde_json::json!({
                        "title": {"type": "string"},
                        "task_type": {"type": "string"},
                        "priority": {"type": "integer"},
                    }),
                    &["title"],
                ),
            },
            McpToolSpec {
                name: "start_task".into(),
                description: "Transition a task to in_progress".into(),
                input_schema: schema(serde_json::json!({"task_id": {"type": "string"}}), &["task_id"]),
            },
            McpToolSpec {
                name: "close_task".into(),
                description: "Transition a task to closed".into(),
                input_schema: schema(
                    serde_json::json!({"task_id": {"type": "string"}, "skip_validation": {"type": "boolean"}}),
                    &["task_id"],
                ),
            },
            McpToolSpec {
                name: "escalate_task".into(),
                description: "Transition a task to escalated, flagging it for user review".into(),
                input_schema: schema(serde_json::json!({"task_id": {"type": "string"}}), &["task_id"]),
            },
            McpToolSpec {
                name: "add_task_dependency".into(),
                description: "Insert a blocks/related/discovered-from edge between two tasks".into(),
                input_schema: schema(
                    serde_json::json!({
                        "from": {"type": "string"},
                        "to": {"type": "string"},
                        "dep_type": {"type": "string"},
                    }),
                    &["from", "to"],
                ),
            },
        ]
    }

    async fn call(&self, tool_name: &str, arguments: Value) -> McpCallResponse {
        match tool_name {
            "list_tasks" => self.list(arguments),
            "list_ready_tasks" => self.list_ready(),
            "get_task" => self.get(arguments),
            "create_task" => self.create(arguments),
            "start_task" => self.transition(arguments, TaskStatus::InProgress),
            "close_task" => self.transition(arguments, TaskStatus::Closed),
            "escalate_task" => self.transition(arguments, TaskStatus::Escalated),
            "add_task_dependency" => self.add_dependency(arguments),
            other => McpCallResponse::error(&GobbyError::not_found(format!("unknown gobby-tasks tool '{other}'"))),
        }
    }
}

/// Read-only session inspection, used by workflow actions (`find_parent_session`)
/// and operator tooling alike (spec §4.9, §3 `Session`).
pub struct SessionsRegistry {
    project_id: String,
    sessions: Arc<SessionManager>,
}

impl SessionsRegistry {
    pub fn new(project_id: impl Into<String>, sessions: Arc<SessionManager>) -> Self {
        Self { project_id: project_id.into(), sessions }
    }
}

#[async_trait]
impl InternalRegistry for SessionsRegistry {
    fn name(&self) -> &str {
        "gobby-sessions"
    }

    fn catalog(&self) -> Vec<McpToolSpec> {
        vec![
            McpToolSpec {
                name: "list_sessions".into(),
                description: "List sessions in the current project".into(),
                input_schema: schema(serde_json::json!({}), &[]),
            },
            McpToolSpec {
                name: "get_session".into(),
                description: "Fetch one session by id or unique prefix".into(),
                input_schema: schema(serde_json::json!({"session_id": {"type": "string"}}), &["session_id"]),
            },
        ]
    }

    async fn call(&self, tool_name: &str, arguments: Value) -> McpCallResponse {
        match tool_name {
            "list_sessions" => {
                let sessions = self.sessions.list_by_project(&self.project_id);
                McpCallResponse::ok(serde_json::to_value(sessions).unwrap_or(Value::Null))
            }
            "get_session" => {
                let Some(id) = param_str(&arguments, "session_id") else {
                    return McpCallResponse::error(&GobbyError::invalid("missing session_id"));
                };
                match self.sessions.get(id) {
                    Some(session) => McpCallResponse::ok(serde_json::to_value(session).unwrap_or(Value::Null)),
                    None => McpCallResponse::error(&GobbyError::not_found(format!("session {id}"))),
                }
            }
            other => McpCallResponse::error(&GobbyError::not_found(format!("unknown gobby-sessions tool '{other}'"))),
        }
    }
}
