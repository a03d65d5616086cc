// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule registry — resolves a phase's `check_rules: [names...]` to concrete
//! [`RuleDefinition`]s merged with inline rules, deduplicating same-named
//! candidates by tier order (spec §4.4).

use std::collections::HashMap;

use gobby_core::{resolve_tier, RuleDefinition};

#[derive(Debug, Default, Clone)]
pub struct RuleRegistry {
    named: HashMap<String, Vec<RuleDefinition>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule candidate for its name; multiple tiers may register
    /// under the same name (bundled + user + project + file-local).
    pub fn register(&mut self, rule: RuleDefinition) {
        self.named.entry(rule.name.clone()).or_default().push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = RuleDefinition>) {
        for r in rules {
            self.register(r);
        }
    }

    /// Resolve one name to its highest-tier definition.
    pub fn resolve(&self, name: &str) -> Option<RuleDefinition> {
        let candidates = self.named.get(name)?;
        resolve_tier(candidates.iter()).cloned()
    }

    /// Resolve a phase's `check_rules` list plus its inline `rules`, in
    /// declaration order: named rules first (resolved to their tier-winning
    /// definition), then inline rules.
    pub fn resolve_for_phase(&self, check_rules: &[String], inline: &[RuleDefinition]) -> Vec<RuleDefinition> {
        let mut resolved: Vec<RuleDefinition> = check_rules.iter().filter_map(|name| self.resolve(name)).collect();
        resolved.extend(inline.iter().cloned());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::{RuleAction, RuleTier};

    fn rule(name: &str, tier: RuleTier) -> RuleDefinition {
        RuleDefinition {
            name: name.to_string(),
            tools: vec![],
            mcp_tools: vec![],
            command_pattern: None,
            when: "true".into(),
            reason: "r".into(),
            action: RuleAction::Block,
            tier,
        }
    }

    #[test]
    fn project_tier_wins_over_bundled_for_same_name() {
        let mut reg = RuleRegistry::new();
        reg.register(rule("no-force-push", RuleTier::Bundled));
        reg.register(rule("no-force-push", RuleTier::Project));
        let resolved = reg.resolve("no-force-push").unwrap();
        assert_eq!(resolved.tier, RuleTier::Project);
    }

    #[test]
    fn resolve_for_phase_appends_inline_after_named() {
        let mut reg = RuleRegistry::new();
        reg.register(rule("named-rule", RuleTier::Bundled));
        let inline = vec![rule("inline-rule", RuleTier::FileLocal)];
        let resolved = reg.resolve_for_phase(&["named-rule".to_string()], &inline);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "named-rule");
        assert_eq!(resolved[1].name, "inline-rule");
    }

    #[test]
    fn unresolvable_name_is_silently_skipped() {
        let reg = RuleRegistry::new();
        let resolved = reg.resolve_for_phase(&["missing".to_string()], &[]);
        assert!(resolved.is_empty());
    }
}
