// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow YAML schema (spec §3 "Workflow definition", §6 "Workflow
//! YAML schema"). A [`WorkflowDefinition`] is a pure value — immutable once
//! loaded and locked at session start (spec §4.5).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use gobby_core::RuleDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Phase,
    Lifecycle,
}

impl Default for WorkflowType {
    fn default() -> Self {
        WorkflowType::Phase
    }
}

/// Tools a phase allows. Either the literal string `"all"` (with
/// `blocked_tools` carving out exceptions) or an explicit allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AllowedTools {
    All,
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for AllowedTools {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            All(String),
            List(Vec<String>),
        }
        match Helper::deserialize(deserializer)? {
            Helper::All(s) if s == "all" => Ok(AllowedTools::All),
            Helper::All(other) => Ok(AllowedTools::List(vec![other])),
            Helper::List(list) => Ok(AllowedTools::List(list)),
        }
    }
}

impl Default for AllowedTools {
    fn default() -> Self {
        AllowedTools::All
    }
}

/// A named verb executed by the engine's action executor (spec §4.8).
/// `action` selects the handler; all other fields are verb-specific
/// parameters rendered through the `{{ expr }}` templating language before
/// being handed to the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(flatten)]
    pub params: IndexMap<String, serde_json::Value>,
}

/// One candidate transition out of a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub to: String,
    pub when: String,
    #[serde(default)]
    pub on_transition: Vec<Action>,
}

/// An exit condition entry: either a bare expression string or a typed
/// object (`user_approval`, `webhook`, or a plain `when` expression).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExitCondition {
    Expr(String),
    Typed {
        #[serde(rename = "type")]
        kind: ExitConditionKind,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        when: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitConditionKind {
    UserApproval,
    Webhook,
    Expression,
}

impl ExitCondition {
    /// `true` for the two condition kinds that block until satisfied by an
    /// external event rather than a plain expression (spec §4.7 step 5).
    pub fn blocks_until_satisfied(&self) -> bool {
        matches!(
            self,
            ExitCondition::Typed { kind: ExitConditionKind::UserApproval | ExitConditionKind::Webhook, .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub on_enter: Vec<Action>,
    #[serde(default)]
    pub on_exit: Vec<Action>,
    #[serde(default)]
    pub allowed_tools: AllowedTools,
    #[serde(default)]
    pub blocked_tools: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub check_rules: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub exit_conditions: Vec<ExitCondition>,
    #[serde(default)]
    pub exit_when: Option<String>,
}

impl Phase {
    /// Tool permission check (spec §4.7 step 3 / §8 invariant 7): a tool is
    /// permitted when `allowed_tools` is `all` and it's not in
    /// `blocked_tools`, or when it appears explicitly in `allowed_tools`.
    pub fn tool_permitted(&self, tool_name: &str) -> bool {
        match &self.allowed_tools {
            AllowedTools::All => !self.blocked_tools.iter().any(|t| t == tool_name),
            AllowedTools::List(list) => list.iter().any(|t| t == tool_name),
        }
    }
}

/// Tunables for stuck detection (spec §4.7, §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckDetectionSettings {
    #[serde(default = "default_max_phase_duration")]
    pub max_phase_duration_minutes: u64,
    #[serde(default = "default_same_task_threshold")]
    pub same_task_threshold: u32,
    #[serde(default = "default_validation_failure_threshold")]
    pub validation_failure_threshold: u32,
}

fn default_max_phase_duration() -> u64 {
    30
}
fn default_same_task_threshold() -> u32 {
    3
}
fn default_validation_failure_threshold() -> u32 {
    3
}

impl Default for StuckDetectionSettings {
    fn default() -> Self {
        Self {
            max_phase_duration_minutes: default_max_phase_duration(),
            same_task_threshold: default_same_task_threshold(),
            validation_failure_threshold: default_validation_failure_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub stuck_detection: StuckDetectionSettings,
}

/// The top-level workflow document (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub r#type: WorkflowType,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub rule_definitions: IndexMap<String, RuleDefinition>,
    #[serde(default)]
    pub tool_rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub observers: Vec<gobby_core::Observer>,
    /// Phase-based workflows only.
    #[serde(default)]
    pub phases: Vec<Phase>,
    /// Lifecycle workflows only: event name -> actions.
    #[serde(default)]
    pub triggers: IndexMap<String, Vec<Action>>,
}

fn default_version() -> String {
    "1".to_string()
}

impl WorkflowDefinition {
    pub fn initial_phase(&self) -> Option<&Phase> {
        self.phases.first()
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }
}
