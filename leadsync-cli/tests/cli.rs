use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

use leadsync_core::memory::MemoryFixture;

const FIXTURE: &str = r#"
containers:
  new: list-new
  contacted: list-contacted
  qualified: list-qualified
  lost: list-lost
leads:
  - id: L001
    name: Ann Example
    email: ann@example.com
    status: new
    source: referral
  - id: L002
    name: Bo Example
    email: bo@example.com
    status: Won
    source: ads
tasks: []
"#;

/// Every variable the remote mode requires.
const FULL_ENV: &[(&str, &str)] = &[
    ("SHEET_ID", "sheet-1"),
    ("GOOGLE_ACCESS_TOKEN", "ya29.secret-token"),
    ("TRELLO_KEY", "trello-key"),
    ("TRELLO_TOKEN", "trello-secret"),
    ("TRELLO_BOARD_ID", "board-1"),
    ("TRELLO_LIST_TODO_ID", "list-new"),
    ("TRELLO_LIST_IN_PROGRESS_ID", "list-contacted"),
    ("TRELLO_LIST_DONE_ID", "list-qualified"),
    ("TRELLO_LIST_LOST_ID", "list-lost"),
];

fn leadsync(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("leadsync"));
    cmd.env_clear()
        .env("HOME", dir)
        .env("NO_COLOR", "1")
        .current_dir(dir);
    cmd
}

fn write_fixture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("board.yaml");
    fs::write(&path, FIXTURE).expect("write fixture");
    path
}

fn sync_json(dir: &TempDir, fixture: &Path, extra: &[&str]) -> Value {
    let output = leadsync(dir.path())
        .args(["sync", "--json", "--fixture"])
        .arg(fixture)
        .args(extra)
        .output()
        .expect("run leadsync sync");
    assert!(
        output.status.success(),
        "sync failed: status={} stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr),
    );
    serde_json::from_slice(&output.stdout).expect("report JSON on stdout")
}

#[test]
fn help_lists_every_command() {
    let dir = TempDir::new().unwrap();
    leadsync(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("sync"))
        .stdout(contains("check"))
        .stdout(contains("normalize"))
        .stdout(contains("daemon"));
}

#[test]
fn fixture_sync_creates_tasks_then_settles() {
    let dir = TempDir::new().unwrap();
    let fixture = write_fixture(&dir);

    let first = sync_json(&dir, &fixture, &[]);
    assert_eq!(first["created"], 2);
    assert_eq!(first["errors"], 0);
    assert_eq!(first["dry_run"], false);

    let saved = MemoryFixture::load(&fixture).expect("fixture saved");
    assert_eq!(saved.tasks.len(), 2);
    let ann = saved.leads.iter().find(|l| l.id == "L001").unwrap();
    let ann_task = saved
        .tasks
        .iter()
        .find(|t| t.task_id.0 == ann.external_ref)
        .expect("L001 linked to its task");
    assert_eq!(ann_task.title, "Ann Example");
    assert_eq!(ann_task.container.0, "list-new");
    let bo = saved.leads.iter().find(|l| l.id == "L002").unwrap();
    let bo_task = saved
        .tasks
        .iter()
        .find(|t| t.task_id.0 == bo.external_ref)
        .expect("L002 linked to its task");
    assert_eq!(bo_task.container.0, "list-qualified");

    let second = sync_json(&dir, &fixture, &[]);
    assert_eq!(second["created"], 0);
    assert_eq!(second["updated"], 0);
    assert_eq!(second["status_synced"], 0);
}

#[test]
fn dry_run_leaves_the_fixture_untouched() {
    let dir = TempDir::new().unwrap();
    let fixture = write_fixture(&dir);
    let before = fs::read_to_string(&fixture).unwrap();

    let report = sync_json(&dir, &fixture, &["--dry-run"]);
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["created"], 2);

    assert_eq!(fs::read_to_string(&fixture).unwrap(), before);
}

#[test]
fn moved_card_updates_the_lead_status() {
    let dir = TempDir::new().unwrap();
    let fixture = dir.path().join("board.yaml");
    fs::write(
        &fixture,
        r#"
containers:
  new: list-new
  contacted: list-contacted
  qualified: list-qualified
  lost: list-lost
leads:
  - id: L001
    name: Ann Example
    status: NEW
    external_ref: card-1
tasks:
  - task_id: card-1
    title: Ann Example
    description: "lead_id: L001"
    container: list-qualified
"#,
    )
    .unwrap();

    let report = sync_json(&dir, &fixture, &[]);
    assert_eq!(report["status_synced"], 1);
    assert_eq!(report["skipped"], 0);

    let saved = MemoryFixture::load(&fixture).unwrap();
    assert_eq!(saved.leads[0].status, "QUALIFIED");
    assert_eq!(saved.tasks[0].container.0, "list-qualified");
}

#[test]
fn human_report_lists_skips() {
    let dir = TempDir::new().unwrap();
    let fixture = dir.path().join("board.yaml");
    fs::write(
        &fixture,
        FIXTURE.replace("tasks: []", "tasks:\n  - task_id: stray\n    title: Stray\n    container: list-new\n"),
    )
    .unwrap();

    leadsync(dir.path())
        .args(["sync", "--dry-run", "--fixture"])
        .arg(&fixture)
        .assert()
        .success()
        .stdout(contains("Sync report"))
        .stdout(contains("(dry run)"))
        .stdout(contains("status synced"))
        .stdout(contains("[tasks-to-leads] stray: unlinked"));
}

#[test]
fn missing_configuration_names_every_key() {
    let dir = TempDir::new().unwrap();
    leadsync(dir.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("invalid configuration"))
        .stderr(contains("SHEET_ID"))
        .stderr(contains("TRELLO_TOKEN"))
        .stderr(contains("TRELLO_LIST_LOST_ID"));
}

#[test]
fn check_prints_redacted_config() {
    let dir = TempDir::new().unwrap();
    leadsync(dir.path())
        .arg("check")
        .envs(FULL_ENV.iter().copied())
        .env("SYNC_INTERVAL_SECS", "120")
        .assert()
        .success()
        .stdout(contains("configuration OK"))
        .stdout(contains("sheet-1"))
        .stdout(contains("interval_secs: 120"))
        .stdout(contains("***"))
        .stdout(contains("ya29.secret-token").not())
        .stdout(contains("trello-secret").not());
}

#[test]
fn check_reads_the_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("leadsync.yaml");
    fs::write(&config, "unknown_status: reject\nlog_level: debug\n").unwrap();

    leadsync(dir.path())
        .arg("check")
        .envs(FULL_ENV.iter().copied())
        .assert()
        .success()
        .stdout(contains("unknown_status: reject"))
        .stdout(contains("log_level: debug"));
}

#[test]
fn normalize_shows_canonical_statuses() {
    let dir = TempDir::new().unwrap();
    let output = leadsync(dir.path())
        .args(["normalize", "--json", "In Progress", "won", "banana", ""])
        .output()
        .expect("run normalize");
    assert!(output.status.success());
    let rows: Value = serde_json::from_slice(&output.stdout).unwrap();
    let statuses: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["CONTACTED", "QUALIFIED", "NEW", "NEW"]);
}

#[test]
fn normalize_with_reject_policy_fails_on_unknown() {
    let dir = TempDir::new().unwrap();
    leadsync(dir.path())
        .args(["normalize", "--policy", "reject", "done", "banana"])
        .assert()
        .failure()
        .stdout(contains("QUALIFIED"))
        .stdout(contains("unrecognized"));
}

#[test]
fn daemon_status_when_not_running() {
    let dir = TempDir::new().unwrap();
    leadsync(dir.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"))
        .stdout(contains(".leadsync/daemon.sock"));

    leadsync(dir.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn daemon_logs_without_a_log_file() {
    let dir = TempDir::new().unwrap();
    leadsync(dir.path())
        .args(["daemon", "logs", "--lines", "5"])
        .assert()
        .success()
        .stdout(contains("log file not found"));
}
