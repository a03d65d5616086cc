//! Dual-write durability (spec §8 scenario D, §4.1 "Failures").

use std::sync::Arc;

use gobby_core::{Project, ProjectId};
use gobby_storage::{ProjectManager, Store};

/// Scenario D: the hub journal is unopenable at `Store::open` time (its
/// parent path is occupied by a plain file, so `create_dir_all` fails).
/// The project journal must still accept writes and the store must report
/// the hub as disabled rather than propagating the failure.
#[test]
fn hub_failure_disables_hub_without_affecting_project_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let hub_parent = dir.path().join("hub-is-a-file");
    std::fs::write(&hub_parent, b"not a directory").expect("seed blocking file");
    let hub_path = hub_parent.join("hub.journal");

    let store =
        Arc::new(Store::open(dir.path().join("project.journal"), Some(&hub_path)).expect("project journal opens fine"));
    assert!(store.hub_disabled(), "hub journal should be disabled after the failed open");

    let projects = ProjectManager::new(store.clone());
    let project = Project::new(
        ProjectId::from_string("prj-000001"),
        dir.path().to_path_buf(),
        "demo".to_string(),
        "2026-01-01T00:00:00Z".to_string(),
    );
    projects.upsert(project.clone()).expect("project write still succeeds against the project journal");

    let reloaded = projects.get("prj-000001").expect("project readable after write");
    assert_eq!(reloaded.name, "demo");
}

/// Reopening the project journal replays every previously-written entry
/// (spec §8 round-trip property).
#[test]
fn project_journal_replays_on_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal_path = dir.path().join("project.journal");

    {
        let store = Arc::new(Store::open(&journal_path, None).expect("open"));
        let projects = ProjectManager::new(store);
        let project = Project::new(
            ProjectId::from_string("prj-000002"),
            dir.path().to_path_buf(),
            "demo".to_string(),
            "2026-01-01T00:00:00Z".to_string(),
        );
        projects.upsert(project).expect("write");
    }

    let store = Arc::new(Store::open(&journal_path, None).expect("reopen"));
    let projects = ProjectManager::new(store);
    let reloaded = projects.get("prj-000002").expect("project survives reopen");
    assert_eq!(reloaded.name, "demo");
}
