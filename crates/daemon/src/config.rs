// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading (spec §6): `~/.gobby/config.yaml` merged with an
//! optional project-local `.gobby/config.yaml` override, `${VAR:-default}`
//! environment interpolation, and a startup file-mode audit — mirroring
//! the teacher's `env.rs` environment-variable resolution pattern, extended
//! to a YAML document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DaemonError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutonomousLoopConfig {
    #[serde(default = "default_stagnation_window")]
    pub stagnation_window_actions: u32,
    #[serde(default = "default_max_same_task")]
    pub max_same_task_repeats: u32,
    #[serde(default = "default_max_validation_failures")]
    pub max_validation_failures: u32,
}

fn default_stagnation_window() -> u32 {
    20
}

fn default_max_same_task() -> u32 {
    3
}

fn default_max_validation_failures() -> u32 {
    3
}

impl Default for AutonomousLoopConfig {
    fn default() -> Self {
        Self {
            stagnation_window_actions: default_stagnation_window(),
            max_same_task_repeats: default_max_same_task(),
            max_validation_failures: default_max_validation_failures(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskValidationConfig {
    #[serde(default)]
    pub require_commit_before_stop: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// One entry in `mcp_servers:` — a real upstream gets dialed; internal
/// registries are never listed here, they're always present (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Which workflow this project runs (spec §4.7 "Resolve workflow and
/// state"); the loader looks this name up across the bundled/user/project
/// tiers the same way a workflow reference inside a lifecycle `triggers`
/// action would.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_name")]
    pub name: String,
}

fn default_workflow_name() -> String {
    "plan-execute".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { name: default_workflow_name() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Top-level `~/.gobby/config.yaml` / project `.gobby/config.yaml`
/// document, every section additive and optional (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GobbyConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub autonomous_loop: AutonomousLoopConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub task_validation: TaskValidationConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub linear: LinearConfig,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub llm_providers: HashMap<String, LlmProviderConfig>,
    #[serde(default)]
    pub hub_database_path: Option<PathBuf>,
}

/// User config dir: `~/.gobby`.
pub fn user_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".gobby"))
}

/// Default hub database path: `~/.gobby/gobby-hub.db` (spec §6).
pub fn default_hub_path() -> Option<PathBuf> {
    user_dir().map(|d| d.join("gobby-hub.db"))
}

fn interpolation_pattern() -> Regex {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").unwrap()
}

/// Replace `${VAR}` / `${VAR:-default}` occurrences in `raw` using the
/// process environment (spec §6 "Env-var interpolation").
pub fn interpolate(raw: &str) -> String {
    let re = interpolation_pattern();
    re.replace_all(raw, |caps: &regex::Captures| {
        let var = &caps[1];
        match std::env::var(var) {
            Ok(v) => v,
            Err(_) => caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
        }
    })
    .into_owned()
}

fn read_yaml(path: &Path) -> Result<Option<GobbyConfig>, DaemonError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| DaemonError::Config(e.to_string()))?;
    let interpolated = interpolate(&raw);
    let parsed: GobbyConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| DaemonError::Config(e.to_string()))?;
    Ok(Some(parsed))
}

/// Warn (never fail) when a config file is readable by anyone other than
/// its owner (spec §6 "Secret-like fields must be readable only by the
/// owner (mode 0600)").
#[cfg(unix)]
fn audit_file_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(path = %path.display(), mode = format!("{mode:o}"), "config file is readable by group/other; recommend chmod 600");
        }
    }
}

#[cfg(not(unix))]
fn audit_file_mode(_path: &Path) {}

/// Load `~/.gobby/config.yaml`, then deep-merge a project-local
/// `<project_dir>/.gobby/config.yaml` override on top (project wins
/// section-by-section, whole-value replace — matching the teacher's
/// additive, last-writer-wins config layering).
pub fn load(project_dir: Option<&Path>) -> Result<GobbyConfig, DaemonError> {
    let user_path = user_dir().map(|d| d.join("config.yaml"));
    let mut config = GobbyConfig::default();

    if let Some(path) = &user_path {
        audit_file_mode(path);
        if let Some(loaded) = read_yaml(path)? {
            config = loaded;
        }
    }

    if let Some(project_dir) = project_dir {
        let project_path = project_dir.join(".gobby").join("config.yaml");
        audit_file_mode(&project_path);
        if let Some(project_config) = read_yaml(&project_path)? {
            config = merge_project_override(config, project_config);
        }
    }

    Ok(config)
}

/// Project values replace user values section-by-section when the project
/// document sets them (distinguishing "absent" from "explicit default" is
/// not attempted — additive replace is the documented semantics, spec §6).
fn merge_project_override(base: GobbyConfig, project: GobbyConfig) -> GobbyConfig {
    GobbyConfig {
        telemetry: project.telemetry,
        memory: project.memory,
        skills: project.skills,
        autonomous_loop: project.autonomous_loop,
        workflow: project.workflow,
        task_validation: project.task_validation,
        merge: project.merge,
        github: project.github,
        linear: project.linear,
        mcp_servers: if project.mcp_servers.is_empty() { base.mcp_servers } else { project.mcp_servers },
        llm_providers: if project.llm_providers.is_empty() { base.llm_providers } else { project.llm_providers },
        hub_database_path: project.hub_database_path.or(base.hub_database_path),
    }
}
