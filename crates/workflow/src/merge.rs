// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-wins deep merge over an `extends:` inheritance chain (spec §3, §4.5).
//!
//! Rules: plain scalar fields take the child's value when set; lists of
//! rules are merged by name (child's entry with the same name replaces the
//! parent's); lists of phases are merged by name the same way; any other
//! plain list is replaced wholesale by the child's list when the child
//! supplies one at all.

use indexmap::IndexMap;

use crate::schema::{Phase, WorkflowDefinition};
use gobby_core::RuleDefinition;

/// Merge `child` over `parent`, producing the resolved definition one step
/// up the `extends` chain. `child.extends` is cleared on the result since
/// the chain has now been applied.
pub fn merge(parent: WorkflowDefinition, child: WorkflowDefinition) -> WorkflowDefinition {
    WorkflowDefinition {
        name: child.name,
        extends: None,
        r#type: child.r#type,
        version: child.version,
        settings: child.settings,
        variables: merge_map(parent.variables, child.variables),
        rule_definitions: merge_map(parent.rule_definitions, child.rule_definitions),
        tool_rules: merge_rules_by_name(parent.tool_rules, child.tool_rules),
        observers: merge_observers_by_name(parent.observers, child.observers),
        phases: merge_phases_by_name(parent.phases, child.phases),
        triggers: merge_triggers(parent.triggers, child.triggers),
    }
}

fn merge_map<V>(mut parent: IndexMap<String, V>, child: IndexMap<String, V>) -> IndexMap<String, V> {
    for (k, v) in child {
        parent.insert(k, v);
    }
    parent
}

fn merge_rules_by_name(parent: Vec<RuleDefinition>, child: Vec<RuleDefinition>) -> Vec<RuleDefinition> {
    merge_by_name(parent, child, |r| r.name.clone())
}

fn merge_observers_by_name(
    parent: Vec<gobby_core::Observer>,
    child: Vec<gobby_core::Observer>,
) -> Vec<gobby_core::Observer> {
    merge_by_name(parent, child, |o| o.name().to_string())
}

fn merge_phases_by_name(parent: Vec<Phase>, child: Vec<Phase>) -> Vec<Phase> {
    // Phases additionally preserve the parent's declaration order for
    // untouched phases, with child-only phases appended at the end —
    // mirroring the teacher's `merge_map` insertion-order preservation.
    merge_by_name(parent, child, |p| p.name.clone())
}

fn merge_by_name<T>(parent: Vec<T>, child: Vec<T>, name_of: impl Fn(&T) -> String) -> Vec<T> {
    let mut order: Vec<String> = Vec::new();
    let mut map: IndexMap<String, T> = IndexMap::new();
    for item in parent {
        let name = name_of(&item);
        order.push(name.clone());
        map.insert(name, item);
    }
    for item in child {
        let name = name_of(&item);
        if !map.contains_key(&name) {
            order.push(name.clone());
        }
        map.insert(name, item);
    }
    order.into_iter().filter_map(|name| map.shift_remove(&name)).collect()
}

fn merge_triggers(
    parent: IndexMap<String, Vec<crate::schema::Action>>,
    child: IndexMap<String, Vec<crate::schema::Action>>,
) -> IndexMap<String, Vec<crate::schema::Action>> {
    // Triggers are plain lists keyed by event name; the child's list for a
    // given event replaces the parent's wholesale when present.
    merge_map(parent, child)
}
