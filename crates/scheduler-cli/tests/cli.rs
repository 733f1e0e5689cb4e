//! End-to-end tests for the `scheduler` binary.

use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn scheduler_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target/debug/scheduler")
}

#[test]
fn init_creates_project_file() {
    let dir = tempdir().unwrap();
    let project_file = dir.path().join("project.json");

    let output = Command::new(scheduler_binary())
        .args(["init"])
        .arg(&project_file)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "init should succeed");
    assert!(project_file.exists(), "project file should be created");

    let content = std::fs::read_to_string(&project_file).unwrap();
    assert!(content.contains("\"tasks\""));
    assert!(content.contains("\"calendar\""));
}

#[test]
fn run_schedules_the_init_generated_project() {
    let dir = tempdir().unwrap();
    let project_file = dir.path().join("project.json");
    let db_file = dir.path().join("scheduler.db");

    let init = Command::new(scheduler_binary())
        .args(["init"])
        .arg(&project_file)
        .output()
        .expect("Failed to execute init");
    assert!(init.status.success());

    let run = Command::new(scheduler_binary())
        .arg("run")
        .arg(&project_file)
        .arg("--db")
        .arg(&db_file)
        .output()
        .expect("Failed to execute run");

    assert!(run.status.success(), "run should succeed");
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("Critical Path:"));
    assert!(stdout.contains("Build"));
}

#[test]
fn run_emits_json_when_requested() {
    let dir = tempdir().unwrap();
    let project_file = dir.path().join("project.json");
    let db_file = dir.path().join("scheduler.db");

    Command::new(scheduler_binary())
        .args(["init"])
        .arg(&project_file)
        .output()
        .expect("Failed to execute init");

    let run = Command::new(scheduler_binary())
        .arg("run")
        .arg(&project_file)
        .arg("--db")
        .arg(&db_file)
        .args(["--format", "json"])
        .output()
        .expect("Failed to execute run");

    assert!(run.status.success());
    let stdout = String::from_utf8_lossy(&run.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert!(value["tasks"].as_array().unwrap().len() == 2);
}

#[test]
fn run_rejects_a_missing_file() {
    let dir = tempdir().unwrap();
    let db_file = dir.path().join("scheduler.db");

    let run = Command::new(scheduler_binary())
        .arg("run")
        .arg(dir.path().join("missing.json"))
        .arg("--db")
        .arg(&db_file)
        .output()
        .expect("Failed to execute run");

    assert!(!run.status.success());
}
