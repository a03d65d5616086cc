// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (spec §6
//! "process contract"), mirroring the teacher's `env.rs` single point of
//! truth for every `OJ_*` knob — ours are `GOBBY_*`.

use std::time::Duration;

/// Port the hook ingress HTTP endpoint binds, and the port `gobby-hook`
/// reads from the same variable to find it (spec §6 "local HTTP endpoint").
pub const DEFAULT_PORT: u16 = 7890;

pub fn daemon_port() -> u16 {
    std::env::var("GOBBY_DAEMON_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_PORT)
}

/// How often the lifecycle manager's background loop wakes, overridable
/// for faster test iteration.
pub fn lifecycle_scan_interval() -> Option<Duration> {
    std::env::var("GOBBY_LIFECYCLE_SCAN_MS").ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// How often the MCP proxy retries degraded upstreams.
pub fn mcp_retry_interval() -> Duration {
    std::env::var("GOBBY_MCP_RETRY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}
