//! `gobby` operator CLI smoke tests (spec §4 `gobby-cli`), run as a real
//! child process the way the teacher's own CLI suites do.

use assert_cmd::Command;

fn gobby() -> Command {
    Command::cargo_bin("gobby").expect("gobby binary built")
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("gobby ran");
    String::from_utf8(output.stdout).expect("utf8 stdout")
}

#[test]
fn daemon_status_reports_unreachable_with_no_daemon_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().display().to_string();
    let mut cmd = gobby();
    cmd.current_dir(dir.path()).args(["--project", &project, "daemon", "status"]);
    let output = cmd.output().expect("gobby ran");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(stdout.contains("not reachable"), "unexpected stdout: {stdout}");
}

#[test]
fn task_list_fails_cleanly_with_no_daemon_running() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().display().to_string();
    let mut cmd = gobby();
    cmd.current_dir(dir.path()).args(["--project", &project, "task", "list"]);
    let output = cmd.output().expect("gobby ran");
    assert!(!output.status.success(), "task list should fail with no daemon reachable");
}

#[test]
fn top_level_help_lists_every_subcommand() {
    let mut cmd = gobby();
    cmd.arg("--help");
    let stdout = stdout_of(&mut cmd);
    for name in ["daemon", "workflow", "task", "session"] {
        assert!(stdout.contains(name), "--help output missing `{name}`: {stdout}");
    }
}

#[test]
fn daemon_stop_reports_not_running_with_no_lock_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().display().to_string();
    let mut cmd = gobby();
    cmd.current_dir(dir.path()).args(["--project", &project, "daemon", "stop"]);
    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("not running"), "unexpected stdout: {stdout}");
}
