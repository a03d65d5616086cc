// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gobby-hook` — the process contract CLI hook configs invoke (spec §6
//! "Process contract"). Usage: `gobby-hook <cli-family>`, reading one JSON
//! hook payload from stdin and writing the CLI-native decision JSON to
//! stdout. Exit codes: 0 on success, including `block`/`modify` decisions —
//! the decision itself is carried in the stdout payload, not the exit code.
//! Non-zero only when the daemon itself cannot be reached, so a stopped
//! daemon never blocks the CLI it's meant to assist.

use std::io::Read;
use std::process::ExitCode;

use gobby_adapters::{translate, DaemonClient};

const DEFAULT_PORT: u16 = 7890;

fn daemon_addr() -> String {
    let port = std::env::var("GOBBY_DAEMON_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    format!("127.0.0.1:{port}")
}

fn run() -> Result<(), String> {
    let cli = std::env::args().nth(1).ok_or_else(|| "usage: gobby-hook <cli-family>".to_string())?;

    let mut raw_input = String::new();
    std::io::stdin().read_to_string(&mut raw_input).map_err(|e| e.to_string())?;
    let raw: serde_json::Value = serde_json::from_str(&raw_input).map_err(|e| e.to_string())?;

    let event = match translate(&cli, &raw) {
        Ok(event) => event,
        Err(e) => {
            // A malformed or unrecognized payload is our problem, not the
            // daemon's: degrade to a silent continue rather than treat it
            // as "daemon unreachable" (that's what drives the exit code).
            tracing::warn!(error = %e, "hook translation failed, passing through");
            println!("{{\"decision\":\"approve\"}}");
            return Ok(());
        }
    };

    let client = DaemonClient::new(daemon_addr());
    let event_json = serde_json::to_value(&event).map_err(|e| e.to_string())?;
    let response_json = client.post_json("/hook", &event_json).map_err(|e| e.to_string())?;
    let response: gobby_wire::HookResponse =
        serde_json::from_value(response_json).map_err(|e| e.to_string())?;

    let rendered = gobby_adapters::render_response(&response);
    println!("{}", serde_json::to_string(&rendered).map_err(|e| e.to_string())?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter("warn").init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("gobby-hook: {message}");
            ExitCode::FAILURE
        }
    }
}
