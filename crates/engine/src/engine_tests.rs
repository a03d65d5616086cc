use std::sync::Arc;

use serde_json::Value;

use gobby_core::{EventType, ResponseAction};
use gobby_storage::{
    store::Store, ArtifactManager, HandoffManager, SessionManager, StopSignalManager, TaskManager,
    WorkflowStateStorage,
};
use gobby_workflow::{AllowedTools, Phase, Transition, WorkflowDefinition, WorkflowType};
use indexmap::IndexMap;

use super::*;
use crate::actions::{NullAutonomousServices, NullLlmProvider, NullMcpCaller, NullSessionChainer};
use crate::eval::NullHelperProvider;
use crate::observers::ObserverEngine;
use crate::rules::RuleRegistry;
use crate::state::StateManager;

fn plan_execute_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "plan-execute".into(),
        extends: None,
        r#type: WorkflowType::Phase,
        version: "1".into(),
        settings: Default::default(),
        variables: IndexMap::new(),
        rule_definitions: IndexMap::new(),
        tool_rules: vec![],
        observers: vec![],
        phases: vec![
            Phase {
                name: "plan".into(),
                description: String::new(),
                on_enter: vec![],
                on_exit: vec![],
                allowed_tools: AllowedTools::List(vec!["Read".into(), "Glob".into(), "Grep".into()]),
                blocked_tools: vec![],
                rules: vec![],
                check_rules: vec![],
                transitions: vec![],
                exit_conditions: vec![gobby_workflow::ExitCondition::Typed {
                    kind: gobby_workflow::ExitConditionKind::UserApproval,
                    prompt: Some("Ready?".into()),
                    when: None,
                }],
                exit_when: None,
            },
            Phase {
                name: "execute".into(),
                description: String::new(),
                on_enter: vec![],
                on_exit: vec![],
                allowed_tools: AllowedTools::All,
                blocked_tools: vec![],
                rules: vec![],
                check_rules: vec![],
                transitions: vec![],
                exit_conditions: vec![],
                exit_when: None,
            },
        ],
        triggers: IndexMap::new(),
    }
}

struct Harness {
    store: Arc<Store>,
    state: Arc<StateManager>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("p.journal"), None).unwrap());
        let state = Arc::new(StateManager::new(Arc::new(WorkflowStateStorage::new(store.clone()))));
        Self { store, state, _dir: dir }
    }

    fn ctx(&self) -> ActionContext {
        ActionContext::new(
            "ses-1",
            "prj-000001",
            self.state.clone(),
            Arc::new(TaskManager::new(self.store.clone())),
            Arc::new(SessionManager::new(self.store.clone())),
            Arc::new(ArtifactManager::new(self.store.clone())),
            Arc::new(StopSignalManager::new(self.store.clone())),
            Arc::new(HandoffManager::new(self.store.clone())),
            Arc::new(NullLlmProvider),
            Arc::new(NullMcpCaller),
            Arc::new(NullSessionChainer),
            Arc::new(NullAutonomousServices),
            Arc::new(NullHelperProvider),
        )
    }
}

/// Spec §8 Scenario A: plan phase blocks write tools.
#[tokio::test]
async fn scenario_a_plan_phase_blocks_write_tools() {
    let harness = Harness::new();
    harness.state.init("ses-1", "plan-execute", "plan").unwrap();
    let workflow = plan_execute_workflow();
    let rules = RuleRegistry::new();
    let observers = ObserverEngine::new();
    let actions = ActionExecutor::new();
    let mut ctx = harness.ctx();
    ctx.event_json = serde_json::json!({"event_type": "before_tool", "tool_name": "Edit"});

    let engine = WorkflowEngine::new();
    let response = engine
        .dispatch(
            DispatchInput {
                workflow: &workflow,
                rules: &rules,
                observers: &observers,
                actions: &actions,
                event_type: EventType::BeforeTool,
                tool_name: Some("Edit"),
            },
            &mut ctx,
        )
        .await
        .unwrap();

    assert_eq!(response.action, ResponseAction::Block);
    assert!(response.message.unwrap().contains("plan"));
    let state = harness.state.get("ses-1").unwrap();
    assert_eq!(state.phase, "plan");
    assert_eq!(state.phase_action_count, 0, "blocked tool calls don't advance the phase action count");
}

/// Spec §8 Scenario B: approval exit condition fires on `user_says('yes')`.
#[tokio::test]
async fn scenario_b_transition_on_approval() {
    struct SaysYes;
    impl crate::eval::HelperProvider for SaysYes {
        fn has_previous_session(&self) -> bool {
            false
        }
        fn has_handoff(&self) -> bool {
            false
        }
        fn has_stop_signal(&self) -> bool {
            false
        }
        fn mcp_called(&self, _s: &str, _t: &str) -> bool {
            false
        }
        fn mcp_result_is_null(&self) -> bool {
            false
        }
        fn mcp_failed(&self) -> bool {
            false
        }
        fn mcp_result_has(&self, _p: &str, _v: &serde_json::Value) -> bool {
            false
        }
        fn task_tree_complete(&self, _r: &str) -> bool {
            false
        }
        fn task_needs_user_review(&self, _t: &str) -> bool {
            false
        }
        fn command_contains(&self, _n: &str) -> bool {
            false
        }
        fn command_in(&self, _l: &[String]) -> bool {
            false
        }
        fn user_says(&self, word: &str) -> bool {
            word == "yes"
        }
        fn is_plan_file(&self, _p: &str) -> bool {
            false
        }
    }

    let harness = Harness::new();
    harness.state.init("ses-1", "plan-execute", "plan").unwrap();
    let workflow = plan_execute_workflow();
    let rules = RuleRegistry::new();
    let observers = ObserverEngine::new();
    let actions = ActionExecutor::new();
    let mut ctx = harness.ctx();
    ctx.helpers = Arc::new(SaysYes);
    ctx.event_json = serde_json::json!({"event_type": "prompt_submit", "prompt_text": "yes"});

    let engine = WorkflowEngine::new();
    engine
        .dispatch(
            DispatchInput {
                workflow: &workflow,
                rules: &rules,
                observers: &observers,
                actions: &actions,
                event_type: EventType::PromptSubmit,
                tool_name: None,
            },
            &mut ctx,
        )
        .await
        .unwrap();

    let state = harness.state.get("ses-1").unwrap();
    assert_eq!(state.phase, "execute");
    assert_eq!(state.phase_action_count, 0);
}

#[tokio::test]
async fn unknown_event_type_is_continue_with_no_state_mutation() {
    let harness = Harness::new();
    harness.state.init("ses-1", "plan-execute", "plan").unwrap();
    let workflow = plan_execute_workflow();
    let rules = RuleRegistry::new();
    let observers = ObserverEngine::new();
    let actions = ActionExecutor::new();
    let mut ctx = harness.ctx();
    ctx.event_json = serde_json::json!({"event_type": "totally_unknown"});

    let engine = WorkflowEngine::new();
    let response = engine
        .dispatch(
            DispatchInput {
                workflow: &workflow,
                rules: &rules,
                observers: &observers,
                actions: &actions,
                event_type: EventType::Unknown,
                tool_name: None,
            },
            &mut ctx,
        )
        .await
        .unwrap();

    assert_eq!(response.action, ResponseAction::Continue);
    let state_before = harness.state.get("ses-1").unwrap();
    assert_eq!(state_before.phase, "plan");
}

#[tokio::test]
async fn lifecycle_workflow_with_no_phases_always_continues() {
    let harness = Harness::new();
    let workflow = WorkflowDefinition {
        name: "session-handoff".into(),
        extends: None,
        r#type: WorkflowType::Lifecycle,
        version: "1".into(),
        settings: Default::default(),
        variables: IndexMap::new(),
        rule_definitions: IndexMap::new(),
        tool_rules: vec![],
        observers: vec![],
        phases: vec![],
        triggers: IndexMap::new(),
    };
    let rules = RuleRegistry::new();
    let observers = ObserverEngine::new();
    let actions = ActionExecutor::new();
    let mut ctx = harness.ctx();
    ctx.event_json = serde_json::json!({"event_type": "before_tool", "tool_name": "Bash"});

    let engine = WorkflowEngine::new();
    let response = engine
        .dispatch(
            DispatchInput {
                workflow: &workflow,
                rules: &rules,
                observers: &observers,
                actions: &actions,
                event_type: EventType::BeforeTool,
                tool_name: Some("Bash"),
            },
            &mut ctx,
        )
        .await
        .unwrap();
    assert_eq!(response.action, ResponseAction::Continue);
}

#[tokio::test]
async fn declared_transition_fires_before_exit_conditions_are_checked() {
    let harness = Harness::new();
    harness.state.init("ses-1", "wf", "plan").unwrap();
    let mut workflow = plan_execute_workflow();
    workflow.phases[0].exit_conditions = vec![];
    workflow.phases[0].transitions =
        vec![Transition { to: "execute".into(), when: "variables.ready == true".into(), on_transition: vec![] }];
    let rules = RuleRegistry::new();
    let observers = ObserverEngine::new();
    let actions = ActionExecutor::new();
    let mut ctx = harness.ctx();
    harness.state.set_variable("ses-1", "ready", serde_json::json!(true)).unwrap();
    ctx.event_json = serde_json::json!({"event_type": "after_tool"});

    let engine = WorkflowEngine::new();
    engine
        .dispatch(
            DispatchInput {
                workflow: &workflow,
                rules: &rules,
                observers: &observers,
                actions: &actions,
                event_type: EventType::AfterTool,
                tool_name: None,
            },
            &mut ctx,
        )
        .await
        .unwrap();

    assert_eq!(harness.state.get("ses-1").unwrap().phase, "execute");
}

#[tokio::test]
async fn require_approval_rule_blocks_until_approved() {
    let harness = Harness::new();
    harness.state.init("ses-1", "wf", "plan").unwrap();
    let mut workflow = plan_execute_workflow();
    workflow.phases[0].exit_conditions = vec![];
    workflow.phases[0].rules = vec![gobby_core::RuleDefinition {
        name: "confirm-edit".into(),
        tools: vec!["Edit".into()],
        mcp_tools: vec![],
        command_pattern: None,
        when: "true".into(),
        reason: "edits need confirmation".into(),
        action: gobby_core::RuleAction::RequireApproval,
        tier: gobby_core::RuleTier::Project,
    }];
    workflow.phases[0].allowed_tools = AllowedTools::All;

    let rules = RuleRegistry::new();
    let observers = ObserverEngine::new();
    let actions = ActionExecutor::new();
    let mut ctx = harness.ctx();
    ctx.event_json = serde_json::json!({"event_type": "before_tool", "tool_name": "Edit"});

    let engine = WorkflowEngine::new();
    let response = engine
        .dispatch(
            DispatchInput {
                workflow: &workflow,
                rules: &rules,
                observers: &observers,
                actions: &actions,
                event_type: EventType::BeforeTool,
                tool_name: Some("Edit"),
            },
            &mut ctx,
        )
        .await
        .unwrap();
    assert_eq!(response.action, ResponseAction::Block);
    let state = harness.state.get("ses-1").unwrap();
    assert_eq!(state.variables.get("pending_approval_tool").and_then(Value::as_str), Some("Edit"));
}

