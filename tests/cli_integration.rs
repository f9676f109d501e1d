//! CLI integration tests for taskboard
//!
//! These tests drive the binary against board files in a temp directory,
//! checking both the printed output and what `--write` saves.

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BOARD: &str = r#"{
  "id": "board-1",
  "title": "Sprint",
  "background": "indigo",
  "members": [
    {"id": "u1", "username": "alice", "avatar": "", "email": "alice@example.com", "role": "admin"}
  ],
  "listIds": ["todo", "doing"],
  "createdAt": "2024-05-01T09:00:00Z",
  "lists": {
    "todo": {"id": "todo", "boardId": "board-1", "title": "To Do", "taskIds": ["t1", "t2", "t3"], "order": 0},
    "doing": {"id": "doing", "boardId": "board-1", "title": "Doing", "taskIds": ["t4"], "order": 1}
  },
  "tasks": {
    "t1": {
      "id": "t1", "listId": "todo", "title": "Fix login", "order": 0,
      "labels": [{"id": "l-1", "text": "Bug", "color": "red"}],
      "dueDate": "2024-05-15", "createdAt": "2024-05-01T09:00:00Z"
    },
    "t2": {
      "id": "t2", "listId": "todo", "title": "Write docs", "order": 1,
      "checklist": [{"id": "i1", "text": "draft", "isCompleted": false}],
      "createdAt": "2024-05-01T09:00:00Z"
    },
    "t3": {
      "id": "t3", "listId": "todo", "title": "Release", "order": 2,
      "dependencies": ["t2"], "createdAt": "2024-05-01T09:00:00Z"
    },
    "t4": {
      "id": "t4", "listId": "doing", "title": "Review", "order": 0,
      "memberIds": ["u1"], "createdAt": "2024-05-01T09:00:00Z"
    }
  }
}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        fs::write(dir.path().join("board.json"), BOARD).unwrap();
        Self { dir }
    }

    fn board_path(&self) -> PathBuf {
        self.dir.path().join("board.json")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Get a command instance for the taskboard binary using this fixture's config
    fn bare_cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("taskboard"));
        cmd.env("TASKBOARD_CONFIG", self.path("config.toml"))
            .env_remove("TASKBOARD_LOG")
            .env_remove("TASKBOARD_BOARD");
        cmd
    }

    /// Same as `bare_cmd`, pointed at the fixture board
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--board").arg(self.board_path());
        cmd
    }

    fn saved(&self) -> Value {
        read_json(&self.board_path())
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

// =============================================================================
// Board Tests
// =============================================================================

#[test]
fn test_new_creates_board_file() {
    let fx = Fixture::new();
    let path = fx.path("fresh.json");

    fx.bare_cmd()
        .arg("--board")
        .arg(&path)
        .args(["new", "Roadmap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created board board-"));

    let saved = read_json(&path);
    assert_eq!(saved["title"], "Roadmap");
    assert_eq!(saved["listIds"], serde_json::json!([]));

    fx.bare_cmd()
        .arg("--board")
        .arg(&path)
        .args(["new", "Roadmap"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_show_text() {
    let fx = Fixture::new();

    fx.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sprint (board-1)"))
        .stdout(predicate::str::contains("To Do [3] (todo)"))
        .stdout(predicate::str::contains("Fix login"))
        .stdout(predicate::str::contains("due 2024-05-15"))
        .stdout(predicate::str::contains("blocked"));
}

#[test]
fn test_show_json() {
    let fx = Fixture::new();

    let output = fx
        .cmd()
        .args(["--format", "json", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["listIds"], serde_json::json!(["todo", "doing"]));
    assert_eq!(json["tasks"]["t3"]["order"], 2);
}

#[test]
fn test_check_reports_consistent_board() {
    let fx = Fixture::new();

    fx.cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("is consistent"));
}

#[test]
fn test_check_reports_drifted_order() {
    let fx = Fixture::new();
    let drifted = BOARD.replace(
        r#""title": "Write docs", "order": 1"#,
        r#""title": "Write docs", "order": 5"#,
    );
    fs::write(fx.board_path(), drifted).unwrap();

    fx.cmd()
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("violation: task t2 has order 5, index is 1"))
        .stderr(predicate::str::contains("1 invariant violation(s) found"));
}

// =============================================================================
// Move Tests
// =============================================================================

#[test]
fn test_move_task_across_lists_with_write() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["--write", "move-task", "todo", "0", "1", "--to", "doing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved task"));

    let saved = fx.saved();
    assert_eq!(saved["lists"]["todo"]["taskIds"], serde_json::json!(["t2", "t3"]));
    assert_eq!(saved["lists"]["doing"]["taskIds"], serde_json::json!(["t4", "t1"]));
    assert_eq!(saved["tasks"]["t1"]["listId"], "doing");
    assert_eq!(saved["tasks"]["t1"]["order"], 1);
    assert_eq!(saved["tasks"]["t2"]["order"], 0);
    assert_eq!(saved["tasks"]["t3"]["order"], 1);
}

#[test]
fn test_move_without_write_leaves_file() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["move-task", "todo", "0", "2"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(fx.board_path()).unwrap(), BOARD);
}

#[test]
fn test_noop_move() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["move-list", "1", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already in place"));
}

#[test]
fn test_move_list_with_write() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["--write", "move-list", "0", "1"])
        .assert()
        .success();

    let saved = fx.saved();
    assert_eq!(saved["listIds"], serde_json::json!(["doing", "todo"]));
    assert_eq!(saved["lists"]["todo"]["order"], 1);
}

#[test]
fn test_move_out_of_range_fails() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["move-task", "todo", "9", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

// =============================================================================
// Task and List Tests
// =============================================================================

#[test]
fn test_add_task_appends() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["--write", "add-task", "doing", "Deploy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created task task-"));

    let saved = fx.saved();
    let ids = saved["lists"]["doing"]["taskIds"].as_array().unwrap();
    assert_eq!(ids.len(), 2);
    let new_id = ids[1].as_str().unwrap();
    assert_eq!(saved["tasks"][new_id]["title"], "Deploy");
    assert_eq!(saved["tasks"][new_id]["order"], 1);
}

#[test]
fn test_add_task_unknown_list_fails() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["add-task", "nope", "Deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("List not found: nope"));
}

#[test]
fn test_dup_task_inserts_after_original() {
    let fx = Fixture::new();

    let output = fx
        .cmd()
        .args(["--format", "json", "--write", "dup-task", "t1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = stdout_json(&output);
    let copy = json["id"].as_str().unwrap().to_string();

    let saved = fx.saved();
    assert_eq!(saved["lists"]["todo"]["taskIds"][1], copy.as_str());
    assert_eq!(saved["tasks"][copy.as_str()]["title"], "Fix login (copy)");
    assert_eq!(saved["tasks"]["t2"]["order"], 2);
}

#[test]
fn test_rm_list_orphans_tasks() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["--write", "rm-list", "todo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 orphaned task(s)"));

    let saved = fx.saved();
    assert_eq!(saved["listIds"], serde_json::json!(["doing"]));
    assert!(saved["tasks"]["t1"].is_object());

    fx.cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("orphaned: t1"));
}

#[test]
fn test_rename_list() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["--write", "rename-list", "doing", "In Progress"])
        .assert()
        .success();

    assert_eq!(fx.saved()["lists"]["doing"]["title"], "In Progress");
}

// =============================================================================
// Dependency Tests
// =============================================================================

#[test]
fn test_satisfied_follows_checklist() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["satisfied", "t3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t3 is blocked"));

    fx.cmd()
        .args([
            "--write",
            "edit",
            "t2",
            r#"{"type":"toggle_checklist_item","item_id":"i1"}"#,
        ])
        .assert()
        .success();

    fx.cmd()
        .args(["satisfied", "t3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t3 is satisfied"));
}

#[test]
fn test_dep_toggles() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["--write", "dep", "t1", "t4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t1 now depends on t4"));

    fx.cmd()
        .args(["--write", "dep", "t1", "t4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t1 no longer depends on t4"));

    assert_eq!(fx.saved()["tasks"]["t1"]["dependencies"], serde_json::json!([]));
}

// =============================================================================
// Filter Tests
// =============================================================================

#[test]
fn test_filter_due_within() {
    let fx = Fixture::new();

    let output = fx
        .cmd()
        .args([
            "--format",
            "json",
            "filter",
            "--due-within",
            "7",
            "--today",
            "2024-05-10",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["lists"][0]["task_ids"], serde_json::json!(["t1"]));
    assert_eq!(json["lists"][1]["task_ids"], serde_json::json!([]));
}

#[test]
fn test_filter_search_text() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["filter", "--search", "DOCS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Write docs"))
        .stdout(predicate::str::contains("1 task(s) match"));
}

#[test]
fn test_filter_by_label_and_member() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["filter", "--label", "red", "--member", "u1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 task(s) match"));
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_replaces_present_fields() {
    let fx = Fixture::new();
    let payload = fx.path("payload.json");
    fs::write(&payload, r#"{"title": "Remote sprint"}"#).unwrap();

    fx.cmd()
        .args(["--write", "merge"])
        .arg(&payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged fields: title"));

    let saved = fx.saved();
    assert_eq!(saved["title"], "Remote sprint");
    assert_eq!(saved["lists"]["todo"]["taskIds"], serde_json::json!(["t1", "t2", "t3"]));
}

#[test]
fn test_merge_ignores_foreign_board() {
    let fx = Fixture::new();
    let payload = fx.path("payload.json");
    fs::write(&payload, r#"{"id": "board-2", "title": "Other"}"#).unwrap();

    fx.cmd()
        .args(["--write", "merge"])
        .arg(&payload)
        .assert()
        .success()
        .stderr(predicate::str::contains("Payload ignored"));

    assert_eq!(fx.saved()["title"], "Sprint");
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_default_format() {
    let fx = Fixture::new();
    fs::write(fx.path("config.toml"), "[output]\ndefault_format = \"json\"\n").unwrap();

    let output = fx
        .cmd()
        .arg("show")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(stdout_json(&output)["id"], "board-1");
}

#[test]
fn test_invalid_config_fails() {
    let fx = Fixture::new();
    fs::write(fx.path("config.toml"), "[filter]\ndue_window_days = \"soon\"\n").unwrap();

    fx.cmd()
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
