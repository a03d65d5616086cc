// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-merge validation (spec §4.5): phase names unique, referenced rules
//! exist, referenced phases exist in transitions, `type` consistent with
//! presence/absence of `phases`.

use std::collections::HashSet;

use crate::schema::{WorkflowDefinition, WorkflowType};

pub fn validate(def: &WorkflowDefinition) -> Result<(), String> {
    match def.r#type {
        WorkflowType::Phase => {
            if def.phases.is_empty() {
                return Err("type: phase requires at least one phase".to_string());
            }
        }
        WorkflowType::Lifecycle => {
            if !def.phases.is_empty() {
                return Err("type: lifecycle must not declare phases".to_string());
            }
        }
    }

    let mut seen_names = HashSet::new();
    for phase in &def.phases {
        if !seen_names.insert(phase.name.as_str()) {
            return Err(format!("duplicate phase name: {}", phase.name));
        }
    }

    let phase_names: HashSet<&str> = def.phases.iter().map(|p| p.name.as_str()).collect();
    for phase in &def.phases {
        for transition in &phase.transitions {
            if transition.to != "complete" && !phase_names.contains(transition.to.as_str()) {
                return Err(format!(
                    "phase {} transitions to undeclared phase {}",
                    phase.name, transition.to
                ));
            }
        }
        for rule_name in &phase.check_rules {
            if !def.rule_definitions.contains_key(rule_name) {
                return Err(format!(
                    "phase {} references undeclared rule {}",
                    phase.name, rule_name
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Phase, Transition};
    use indexmap::IndexMap;

    fn minimal_phase(name: &str) -> Phase {
        Phase {
            name: name.to_string(),
            description: String::new(),
            on_enter: vec![],
            on_exit: vec![],
            allowed_tools: Default::default(),
            blocked_tools: vec![],
            rules: vec![],
            check_rules: vec![],
            transitions: vec![],
            exit_conditions: vec![],
            exit_when: None,
        }
    }

    fn def(phases: Vec<Phase>, kind: WorkflowType) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "w".into(),
            extends: None,
            r#type: kind,
            version: "1".into(),
            settings: Default::default(),
            variables: IndexMap::new(),
            rule_definitions: IndexMap::new(),
            tool_rules: vec![],
            observers: vec![],
            phases,
            triggers: IndexMap::new(),
        }
    }

    #[test]
    fn phase_type_with_no_phases_is_rejected() {
        let w = def(vec![], WorkflowType::Phase);
        assert!(validate(&w).is_err());
    }

    #[test]
    fn lifecycle_type_with_phases_is_rejected() {
        let w = def(vec![minimal_phase("plan")], WorkflowType::Lifecycle);
        assert!(validate(&w).is_err());
    }

    #[test]
    fn lifecycle_with_no_phases_is_accepted() {
        let w = def(vec![], WorkflowType::Lifecycle);
        assert!(validate(&w).is_ok());
    }

    #[test]
    fn duplicate_phase_names_are_rejected() {
        let w = def(vec![minimal_phase("plan"), minimal_phase("plan")], WorkflowType::Phase);
        assert!(validate(&w).is_err());
    }

    #[test]
    fn transition_to_undeclared_phase_is_rejected() {
        let mut plan = minimal_phase("plan");
        plan.transitions.push(Transition { to: "ghost".into(), when: "true".into(), on_transition: vec![] });
        let w = def(vec![plan], WorkflowType::Phase);
        assert!(validate(&w).is_err());
    }

    #[test]
    fn transition_to_complete_is_always_valid() {
        let mut plan = minimal_phase("plan");
        plan.transitions.push(Transition { to: "complete".into(), when: "true".into(), on_transition: vec![] });
        let w = def(vec![plan], WorkflowType::Phase);
        assert!(validate(&w).is_ok());
    }
}
