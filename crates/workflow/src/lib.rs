// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gobby-workflow: the YAML workflow schema, the three-tier loader with
//! `extends:` inheritance resolution, and post-merge validation (spec §4.5).

pub mod error;
pub mod loader;
mod merge;
pub mod schema;
mod validate;

pub use error::{WorkflowLoadError, WorkflowLoadResult};
pub use loader::{load_workflow, WorkflowTiers};
pub use schema::{
    Action, AllowedTools, ExitCondition, ExitConditionKind, Phase, StuckDetectionSettings,
    Transition, WorkflowDefinition, WorkflowSettings, WorkflowType,
};
