// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow engine's hook-event dispatch (spec §4.7): consumes one
//! [`HookEvent`]-shaped context and produces a [`HookResponse`], running
//! the seven-step pipeline — resolve, observe, permission-check, transition,
//! exit-condition, trigger actions, accumulate — in the order the spec
//! fixes. Stuck detection (spec §4.7, §4.11) is a side effect of the same
//! pass rather than a separate dispatch.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use gobby_core::{EventType, RuleAction, RuleDefinition};
use gobby_wire::HookResponse;
use gobby_workflow::{Action, ExitCondition, Phase, WorkflowDefinition, WorkflowType};

use crate::actions::{ActionContext, ActionExecutor};
use crate::error::EngineError;
use crate::eval::{eval_bool, EvalContext};
use crate::observers::ObserverEngine;
use crate::rules::RuleRegistry;

/// Why the engine considers a session stuck (spec §4.7 "Stuck detection",
/// §4.11 `StuckReason`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckReason {
    PhaseDurationExceeded,
    SameTaskRepeated,
    ValidationFailuresExceeded,
}

/// One dispatch's inputs beyond the hook event itself — everything the
/// seven-step pipeline needs that isn't already reachable off `ActionContext`.
pub struct DispatchInput<'a> {
    pub workflow: &'a WorkflowDefinition,
    pub rules: &'a RuleRegistry,
    pub observers: &'a ObserverEngine,
    pub actions: &'a ActionExecutor,
    pub event_type: EventType,
    pub tool_name: Option<&'a str>,
}

pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one hook event through the engine, mutating `ctx`'s workflow
    /// state and accumulating `ctx.response` as it goes (spec §4.7).
    pub async fn dispatch(
        &self,
        input: DispatchInput<'_>,
        ctx: &mut ActionContext,
    ) -> Result<HookResponse, EngineError> {
        let event_type_str = event_type_str(input.event_type);

        // Step 1: resolve workflow + state.
        let existing_state = ctx.state.get(&ctx.session_id);
        let phase_name = match (&input.workflow.r#type, existing_state.as_ref()) {
            (WorkflowType::Lifecycle, _) => None,
            (WorkflowType::Phase, Some(s)) => Some(s.phase.clone()),
            (WorkflowType::Phase, None) => {
                let Some(initial) = input.workflow.initial_phase() else {
                    return Ok(ctx.response.clone());
                };
                if matches!(input.event_type, EventType::SessionStart) {
                    if let Some(on_start) = input.workflow.triggers.get("session_start") {
                        self.run_actions(on_start, input, ctx).await?;
                    }
                }
                ctx.state.init(&ctx.session_id, &input.workflow.name, &initial.name)?;
                Some(initial.name.clone())
            }
        };

        // Step 2: observers mirror event data into variables before guards
        // evaluate against them.
        let (state_value, variables_value) = ctx.eval_values();
        let current_vars = existing_state.map(|s| s.variables).unwrap_or_default();
        let updates = input.observers.apply(
            &input.workflow.observers,
            event_type_str,
            &ctx.event_json,
            &current_vars,
            &ctx.eval_ctx(&state_value, &variables_value),
        );
        for (key, value) in updates {
            ctx.state.set_variable(&ctx.session_id, &key, value)?;
        }

        let phase = phase_name.as_deref().and_then(|name| input.workflow.phase(name));

        // Step 3: before_tool permission + rule checks.
        if matches!(input.event_type, EventType::BeforeTool) {
            if let Some(phase) = phase {
                if let Some(tool) = input.tool_name {
                    if !phase.tool_permitted(tool) || ctx.newly_blocked_tools.iter().any(|t| t == tool) {
                        let response = HookResponse::block(format!(
                            "tool '{tool}' is not permitted in phase '{}'",
                            phase.name
                        ));
                        ctx.response = ctx.response.clone().merge(response);
                        return Ok(ctx.response.clone());
                    }
                    if let Some(block) = self.check_rules(input, phase, tool, ctx)? {
                        ctx.response = ctx.response.clone().merge(block);
                        return Ok(ctx.response.clone());
                    }
                }
            }
        }

        // Step 4: transitions.
        let mut transitioned_this_pass = false;
        if let Some(phase) = phase {
            let (state_value, variables_value) = ctx.eval_values();
            let eval_ctx = ctx.eval_ctx(&state_value, &variables_value);
            let mut fired = None;
            for transition in &phase.transitions {
                match eval_bool(&transition.when, &eval_ctx) {
                    Ok(true) => {
                        fired = Some(transition);
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, expr = %transition.when, "transition `when` evaluation error; treated as false"),
                }
            }
            if let Some(transition) = fired {
                self.run_actions(&phase.on_exit, input, ctx).await?;
                ctx.state.exit_phase(&ctx.session_id)?;
                self.run_actions(&transition.on_transition, input, ctx).await?;
                self.enter_phase(input, &transition.to, ctx).await?;
                transitioned_this_pass = true;
            } else {
                // Step 5: exit conditions, only checked when no explicit
                // transition already fired this pass.
                transitioned_this_pass = self.maybe_complete_phase(input, phase, ctx).await?;
            }
        }

        // Step 6: trigger actions for this event type, keyed by the event's
        // name in the closed taxonomy (spec §6 `triggers: {event: [Action]}`,
        // §4.2 event type list). `session_start` already ran in step 1 for
        // phase-based workflows (it must run before the initial
        // `enter_phase`); lifecycle workflows have no step-1 special case,
        // so `session_start` triggers fire here like every other event.
        let session_start_already_ran =
            matches!((&input.workflow.r#type, input.event_type), (WorkflowType::Phase, EventType::SessionStart));
        if !session_start_already_ran {
            if let Some(actions) = input.workflow.triggers.get(event_type_str) {
                self.run_actions(actions, input, ctx).await?;
            }
        }

        // Spec §8 scenario B: a pass that just transitioned into a new
        // phase must leave that phase's freshly-reset `phase_action_count`
        // at 0, so only `total_action_count` advances here.
        if transitioned_this_pass {
            ctx.state.record_action_after_transition(&ctx.session_id)?;
        } else {
            ctx.state.record_action(&ctx.session_id)?;
        }

        // Stuck detection runs after normal dispatch so it can react to
        // whatever the transitions/actions above just committed.
        if let (WorkflowType::Phase, Some(state)) = (&input.workflow.r#type, ctx.state.get(&ctx.session_id)) {
            if let Some(reason) = self.check_stuck(input.workflow, &state) {
                self.handle_stuck(input, reason, ctx).await?;
            }
        }

        Ok(ctx.response.clone())
    }

    async fn enter_phase(&self, input: &DispatchInput<'_>, to: &str, ctx: &mut ActionContext) -> Result<(), EngineError> {
        ctx.state.enter_phase(&ctx.session_id, to)?;
        if let Some(target) = input.workflow.phase(to) {
            self.run_actions(&target.on_enter, input, ctx).await?;
        }
        Ok(())
    }

    /// Step 5 (spec §4.7): all `exit_conditions` plus `exit_when` must hold
    /// for the phase to complete. `user_approval`/`webhook` conditions with
    /// no explicit `when` fall back to their natural helper predicate
    /// (`user_says('yes')` / `variables.webhook_received`), resolved in
    /// `DESIGN.md`. Returns whether the phase actually completed this pass,
    /// so the caller can skip the `phase_action_count` bump on the same
    /// pass that just reset it (spec §8 scenario B).
    async fn maybe_complete_phase(
        &self,
        input: &DispatchInput<'_>,
        phase: &Phase,
        ctx: &mut ActionContext,
    ) -> Result<bool, EngineError> {
        if phase.exit_conditions.is_empty() && phase.exit_when.is_none() {
            return Ok(false);
        }
        let (state_value, variables_value) = ctx.eval_values();
        let eval_ctx = ctx.eval_ctx(&state_value, &variables_value);

        let mut all_satisfied = true;
        for condition in &phase.exit_conditions {
            if !self.exit_condition_satisfied(condition, &eval_ctx) {
                all_satisfied = false;
                break;
            }
        }
        if all_satisfied {
            if let Some(expr) = &phase.exit_when {
                all_satisfied = eval_bool(expr, &eval_ctx).unwrap_or(false);
            }
        }
        if !all_satisfied {
            return Ok(false);
        }

        self.run_actions(&phase.on_exit, input, ctx).await?;
        ctx.state.exit_phase(&ctx.session_id)?;
        match input.workflow.phases.iter().position(|p| p.name == phase.name) {
            Some(idx) if idx + 1 < input.workflow.phases.len() => {
                let next = input.workflow.phases[idx + 1].name.clone();
                self.enter_phase(input, &next, ctx).await?;
            }
            _ => {
                ctx.state.enter_phase(&ctx.session_id, "complete")?;
            }
        }
        Ok(true)
    }

    fn exit_condition_satisfied(&self, condition: &ExitCondition, ctx: &EvalContext) -> bool {
        match condition {
            ExitCondition::Expr(expr) => eval_bool(expr, ctx).unwrap_or(false),
            ExitCondition::Typed { when: Some(expr), .. } => eval_bool(expr, ctx).unwrap_or(false),
            ExitCondition::Typed { kind, when: None, .. } => {
                use gobby_workflow::ExitConditionKind::*;
                let fallback = match kind {
                    UserApproval => "user_says('yes')",
                    Webhook => "variables.webhook_received == true",
                    Expression => "false",
                };
                eval_bool(fallback, ctx).unwrap_or(false)
            }
        }
    }

    /// Resolve and evaluate `tool_rules` (root, applies in every phase) then
    /// the phase's own `check_rules` + inline `rules` (spec §9 open question
    /// 2: intent is "all phases", phase rules evaluated after root rules).
    /// The first matching rule whose action is `block` wins; `warn` rules
    /// log only; `require_approval` injects an approval prompt and blocks
    /// until a later prompt satisfies it.
    fn check_rules(
        &self,
        input: &DispatchInput<'_>,
        phase: &Phase,
        tool: &str,
        ctx: &mut ActionContext,
    ) -> Result<Option<HookResponse>, EngineError> {
        let (state_value, variables_value) = ctx.eval_values();
        let eval_ctx = ctx.eval_ctx(&state_value, &variables_value);

        let mut candidates: Vec<RuleDefinition> = input.workflow.tool_rules.clone();
        candidates.extend(input.rules.resolve_for_phase(&phase.check_rules, &phase.rules));

        for rule in &candidates {
            if !rule.tools.is_empty() && !rule.tools.iter().any(|t| t == tool) {
                continue;
            }
            if let Some(pattern) = &rule.command_pattern {
                let command = ctx.event_json.pointer("/tool_input/command").and_then(Value::as_str).unwrap_or("");
                match regex::Regex::new(pattern) {
                    Ok(re) if !re.is_match(command) => continue,
                    Err(e) => {
                        warn!(error = %e, pattern = %pattern, "invalid rule command_pattern regex; rule skipped");
                        continue;
                    }
                    _ => {}
                }
            }
            let matched = match eval_bool(&rule.when, &eval_ctx) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, rule = %rule.name, "rule `when` evaluation error; treated as false");
                    false
                }
            };
            if !matched {
                continue;
            }
            match rule.action {
                RuleAction::Block => return Ok(Some(HookResponse::block(rule.reason.clone()))),
                RuleAction::Warn => {
                    warn!(rule = %rule.name, reason = %rule.reason, "rule warning");
                }
                RuleAction::RequireApproval => {
                    if !ctx.helpers.user_says("approve") {
                        ctx.state.set_variable(
                            &ctx.session_id,
                            "pending_approval_tool",
                            Value::String(tool.to_string()),
                        )?;
                        return Ok(Some(HookResponse::block(format!(
                            "approval required before using '{tool}': {}",
                            rule.reason
                        ))));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn run_actions(
        &self,
        actions: &[Action],
        input: &DispatchInput<'_>,
        ctx: &mut ActionContext,
    ) -> Result<(), EngineError> {
        for action in actions {
            if let Some(when) = &action.when {
                let (state_value, variables_value) = ctx.eval_values();
                let eval_ctx = ctx.eval_ctx(&state_value, &variables_value);
                match eval_bool(when, &eval_ctx) {
                    Ok(false) => continue,
                    Err(e) => {
                        warn!(error = %e, action = %action.action, "action `when` evaluation error; treated as false");
                        continue;
                    }
                    Ok(true) => {}
                }
            }
            let params = serde_json::to_value(&action.params).unwrap_or(Value::Null);
            // spec §7: ActionError aborts the current event with `continue`
            // plus a logged warning; partial effects already committed by
            // prior handlers are retained, matching the teacher's
            // at-least-once executor semantics.
            if let Err(e) = input.actions.execute(&action.action, ctx, &params).await {
                warn!(error = %e, action = %action.action, "action execution error; aborting remaining actions for this event");
                return Ok(());
            }
        }
        Ok(())
    }

    fn check_stuck(
        &self,
        workflow: &WorkflowDefinition,
        state: &gobby_storage::WorkflowStateRecord,
    ) -> Option<StuckReason> {
        let settings = &workflow.settings.stuck_detection;
        if let Ok(entered) = DateTime::parse_from_rfc3339(&state.phase_entered_at) {
            let elapsed = Utc::now().signed_duration_since(entered.with_timezone(&Utc));
            if elapsed.num_minutes() >= settings.max_phase_duration_minutes as i64 {
                return Some(StuckReason::PhaseDurationExceeded);
            }
        }
        let validation_failures =
            state.variables.get("validation_failure_count").and_then(Value::as_u64).unwrap_or(0);
        if validation_failures >= settings.validation_failure_threshold as u64 {
            return Some(StuckReason::ValidationFailuresExceeded);
        }
        let same_task_count = state.variables.get("same_task_selected_count").and_then(Value::as_u64).unwrap_or(0);
        if same_task_count >= settings.same_task_threshold as u64 {
            return Some(StuckReason::SameTaskRepeated);
        }
        None
    }

    async fn handle_stuck(
        &self,
        input: &DispatchInput<'_>,
        reason: StuckReason,
        ctx: &mut ActionContext,
    ) -> Result<(), EngineError> {
        if let Some(target) = ["reflect", "stuck"].iter().find_map(|name| input.workflow.phase(name)) {
            let current = ctx.state.get(&ctx.session_id).map(|s| s.phase);
            if current.as_deref() != Some(target.name.as_str()) {
                self.enter_phase(input, &target.name, ctx).await?;
            }
            return Ok(());
        }
        let message = match reason {
            StuckReason::PhaseDurationExceeded => {
                "Progress has stalled in this phase for longer than expected; reassess the plan."
            }
            StuckReason::SameTaskRepeated => "The same task has been selected repeatedly without progress; reassess.",
            StuckReason::ValidationFailuresExceeded => "Validation has failed repeatedly; reassess the approach.",
        };
        ctx.response = ctx.response.clone().merge(HookResponse::modify(message));
        Ok(())
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn event_type_str(event_type: EventType) -> &'static str {
    match event_type {
        EventType::SessionStart => "session_start",
        EventType::SessionEnd => "session_end",
        EventType::PreCompact => "pre_compact",
        EventType::PromptSubmit => "prompt_submit",
        EventType::BeforeTool => "before_tool",
        EventType::AfterTool => "after_tool",
        EventType::Stop => "stop",
        EventType::SubagentStop => "subagent_stop",
        EventType::Notification => "notification",
        EventType::Unknown => "unknown",
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
