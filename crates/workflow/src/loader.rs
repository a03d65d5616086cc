// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow loader: reads YAML from the bundled/user/project tiers,
//! resolves `extends:` chains, and validates the result (spec §4.5).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{WorkflowLoadError, WorkflowLoadResult};
use crate::merge::merge;
use crate::schema::WorkflowDefinition;
use crate::validate::validate;

/// The three tiers workflows are discovered in, lowest to highest
/// precedence for same-named files (spec §4.5: bundled, user, project).
#[derive(Debug, Clone)]
pub struct WorkflowTiers {
    pub bundled_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
}

impl WorkflowTiers {
    pub fn project_only(project_dir: impl Into<PathBuf>) -> Self {
        Self { bundled_dir: None, user_dir: None, project_dir: Some(project_dir.into()) }
    }

    fn search_dirs(&self) -> Vec<&PathBuf> {
        // Highest precedence first: a name found in `project_dir` is used
        // even if the same name also exists bundled.
        [&self.project_dir, &self.user_dir, &self.bundled_dir]
            .into_iter()
            .flatten()
            .collect()
    }

    fn resolve_path(&self, name_or_path: &str) -> Option<PathBuf> {
        // A path with a directory separator or `.yaml`/`.yml` suffix used
        // as given (relative to cwd); otherwise treated as a bare workflow
        // name looked up across the tiers.
        if name_or_path.contains('/') || name_or_path.ends_with(".yaml") || name_or_path.ends_with(".yml") {
            let p = PathBuf::from(name_or_path);
            return p.exists().then_some(p);
        }
        for dir in self.search_dirs() {
            for ext in ["yaml", "yml"] {
                let candidate = dir.join(format!("{name_or_path}.{ext}"));
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

fn read_definition(path: &Path) -> WorkflowLoadResult<WorkflowDefinition> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| WorkflowLoadError::Io { path: path.display().to_string(), source })?;
    serde_yaml::from_str(&contents)
        .map_err(|source| WorkflowLoadError::Yaml { path: path.display().to_string(), source })
}

/// Load a workflow by name (or explicit path), resolving its `extends:`
/// chain with a child-wins deep merge and rejecting inheritance cycles.
pub fn load_workflow(tiers: &WorkflowTiers, name_or_path: &str) -> WorkflowLoadResult<WorkflowDefinition> {
    let resolved = resolve_chain(tiers, name_or_path, &mut HashSet::new())?;
    validate(&resolved).map_err(|reason| WorkflowLoadError::Validation { name: resolved.name.clone(), reason })?;
    Ok(resolved)
}

fn resolve_chain(
    tiers: &WorkflowTiers,
    name_or_path: &str,
    seen: &mut HashSet<String>,
) -> WorkflowLoadResult<WorkflowDefinition> {
    let path = tiers
        .resolve_path(name_or_path)
        .ok_or_else(|| WorkflowLoadError::NotFound(name_or_path.to_string()))?;
    let canonical_key = path.display().to_string();
    if !seen.insert(canonical_key.clone()) {
        return Err(WorkflowLoadError::ExtendsCycle(canonical_key));
    }
    let def = read_definition(&path)?;
    debug!(workflow = %def.name, path = %path.display(), "loaded workflow document");

    match &def.extends {
        Some(parent_ref) => {
            let parent = resolve_chain(tiers, parent_ref, seen)?;
            Ok(merge(parent, def))
        }
        None => Ok(def),
    }
}
