// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule definitions — named, reusable guards (spec §3, §4.4).

use serde::{Deserialize, Serialize};

/// What a matching rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block,
    Warn,
    RequireApproval,
}

/// Tier a rule was resolved from; lookup order is
/// file-local > project > user > bundled (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTier {
    Bundled,
    User,
    Project,
    FileLocal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub mcp_tools: Vec<String>,
    #[serde(default)]
    pub command_pattern: Option<String>,
    /// Expression evaluated by `gobby-engine`'s evaluator.
    pub when: String,
    pub reason: String,
    #[serde(default = "default_rule_action")]
    pub action: RuleAction,
    #[serde(default)]
    pub tier: RuleTier,
}

impl Default for RuleTier {
    fn default() -> Self {
        RuleTier::Bundled
    }
}

fn default_rule_action() -> RuleAction {
    RuleAction::Block
}

/// Resolve a set of same-named rule candidates to the highest tier,
/// matching the file-local > project > user > bundled order.
pub fn resolve_tier<'a>(candidates: impl IntoIterator<Item = &'a RuleDefinition>) -> Option<&'a RuleDefinition> {
    candidates.into_iter().max_by_key(|r| r.tier)
}
