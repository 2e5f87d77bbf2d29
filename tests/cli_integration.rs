//! Integration tests for the `td` CLI.
//!
//! Every test runs `td --demo` as a subprocess inside a temp directory, so
//! each invocation starts from the same seeded in-memory board.

use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;

fn td(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_td"))
        .current_dir(dir)
        .env("TASKDECK_LOG", "off")
        .args(args)
        .output()
        .expect("failed to run td")
}

fn demo(dir: &Path, args: &[&str]) -> Output {
    let mut full = vec!["--demo"];
    full.extend_from_slice(args);
    td(dir, &full)
}

fn stdout(out: &Output) -> String {
    assert!(
        out.status.success(),
        "td failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn json(out: &Output) -> serde_json::Value {
    serde_json::from_str(&stdout(out)).expect("stdout is not JSON")
}

#[test]
fn sections_lists_every_loaded_task() {
    let tmp = tempfile::tempdir().unwrap();
    let text = stdout(&demo(tmp.path(), &["sections"]));
    assert_eq!(
        text,
        "   1  To Do (3 tasks)\n   2  In Progress (1 task)\n   3  Backlog (45 tasks)\n"
    );
}

#[test]
fn tasks_json_pages_through_large_sections() {
    let tmp = tempfile::tempdir().unwrap();
    let v = json(&demo(tmp.path(), &["--json", "tasks", "backlog"]));
    assert_eq!(v["name"], "Backlog");
    let tasks = v["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 45);
    assert_eq!(tasks[44]["name"], "Backlog item 45");
}

#[test]
fn tasks_filtered_by_priority() {
    let tmp = tempfile::tempdir().unwrap();
    let v = json(&demo(
        tmp.path(),
        &["--json", "tasks", "3", "--priority", "high"],
    ));
    let names: Vec<&str> = v["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "Backlog item 7",
            "Backlog item 14",
            "Backlog item 21",
            "Backlog item 28",
            "Backlog item 35",
            "Backlog item 42",
        ]
    );
}

#[test]
fn tasks_text_output() {
    let tmp = tempfile::tempdir().unwrap();
    let text = stdout(&demo(tmp.path(), &["tasks", "In Progress"]));
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("== In Progress (2) =="));
    assert_eq!(lines.next(), Some(""));
    assert_eq!(
        lines.next(),
        Some("[ ]    4 Migrate billing service  (In Progress, high)  @Grace Hopper")
    );
}

#[test]
fn search_reports_section() {
    let tmp = tempfile::tempdir().unwrap();
    let text = stdout(&demo(tmp.path(), &["search", "(?i)billing"]));
    assert!(text.starts_with("[In Progress] [ ]    4 Migrate billing service"), "{}", text);
}

#[test]
fn users_lists_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let v = json(&demo(tmp.path(), &["--json", "users"]));
    let names: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ada Lovelace", "Grace Hopper", "Edsger Dijkstra"]);
}

#[test]
fn add_prints_new_id() {
    let tmp = tempfile::tempdir().unwrap();
    let text = stdout(&demo(tmp.path(), &["add", "To Do", "Ship it"]));
    assert_eq!(text.trim(), "50");
}

#[test]
fn add_with_fields_as_json() {
    let tmp = tempfile::tempdir().unwrap();
    let v = json(&demo(
        tmp.path(),
        &[
            "--json",
            "add",
            "1",
            "Plan offsite",
            "--priority",
            "high",
            "--due",
            "2030-05-01",
            "--assignee",
            "3",
        ],
    ));
    assert_eq!(v["name"], "Plan offsite");
    assert_eq!(v["priority"], "high");
    assert_eq!(v["due"], "2030-05-01");
    assert_eq!(v["assignees"], serde_json::json!([3]));
}

#[test]
fn set_updates_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let v = json(&demo(
        tmp.path(),
        &["--json", "set", "1", "priority=low", "due=none", "done=true"],
    ));
    assert_eq!(v["priority"], "low");
    assert_eq!(v["completed"], true);
    assert_eq!(v["status"], "completed");
    assert!(v.get("due").is_none());
}

#[test]
fn set_rejects_unknown_field() {
    let tmp = tempfile::tempdir().unwrap();
    let out = demo(tmp.path(), &["set", "1", "colour=blue"]);
    assert!(!out.status.success());
}

#[test]
fn unknown_section_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let out = demo(tmp.path(), &["tasks", "Nope"]);
    assert!(!out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("section not found: Nope"), "{}", err);
}

#[test]
fn rm_unknown_task_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let out = demo(tmp.path(), &["rm", "999"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("task not found: 999"));
}

#[test]
fn section_add_prints_id() {
    let tmp = tempfile::tempdir().unwrap();
    let text = stdout(&demo(tmp.path(), &["section", "add", "Ideas"]));
    assert_eq!(text.trim(), "4");
}

#[test]
fn config_set_creates_file_and_show_reads_it() {
    let tmp = tempfile::tempdir().unwrap();
    stdout(&td(tmp.path(), &["config", "set", "list.page_size", "50"]));
    let file = std::fs::read_to_string(tmp.path().join("taskdeck.toml")).unwrap();
    assert!(file.contains("page_size = 50"), "{}", file);

    let shown = stdout(&td(tmp.path(), &["config", "show"]));
    assert!(shown.starts_with("# "));
    assert!(shown.contains("page_size = 50"));
}

#[test]
fn config_set_rejects_unknown_key() {
    let tmp = tempfile::tempdir().unwrap();
    let out = td(tmp.path(), &["config", "set", "list.nope", "1"]);
    assert!(!out.status.success());
    assert!(!tmp.path().join("taskdeck.toml").exists());
}
