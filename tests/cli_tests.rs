//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the persona-engine binary
fn engine_cmd() -> Command {
    let mut cmd = Command::cargo_bin("persona-engine").unwrap();
    cmd.env_remove("PERSONA_ENGINE_CONFIG");
    cmd
}

/// A config pointing at a snapshot inside a temp dir, with the mock
/// generator and no pauses.
struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("engine.toml");
        let snapshot = dir.path().join("store.json");
        fs::write(
            &config,
            format!(
                r#"
[engine]
unit_delay_ms = 0

[batch]
batch_delay_ms = 0
run_all_delay_ms = 0

[store]
snapshot_path = "{}"

[generator]
provider = "mock"
"#,
                snapshot.display()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn cmd(&self) -> Command {
        let mut cmd = engine_cmd();
        cmd.arg("--config").arg(&self.config).arg("--quiet");
        cmd
    }

    fn snapshot(&self) -> PathBuf {
        self.dir.path().join("store.json")
    }

    fn seeded() -> Self {
        let ws = Self::new();
        ws.cmd()
            .arg("seed")
            .arg(common::fixture_path("seed.json"))
            .assert()
            .success();
        ws
    }
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    engine_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: persona-engine"))
        .stdout(predicate::str::contains("cycle"))
        .stdout(predicate::str::contains("seed-thread"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    engine_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("persona-engine"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"));
}

#[test]
fn test_short_version_flag() {
    engine_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("persona-engine"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show() {
    let ws = Workspace::new();
    engine_cmd()
        .arg("config")
        .arg("show")
        .arg("--config")
        .arg(&ws.config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[engine]"))
        .stdout(predicate::str::contains("[generator]"))
        .stdout(predicate::str::contains("provider = \"mock\""))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    engine_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/path/config.toml")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E100"));
}

#[test]
fn test_config_init_help() {
    engine_cmd()
        .arg("config")
        .arg("init")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialize"))
        .stdout(predicate::str::contains("--path"))
        .stdout(predicate::str::contains("--force"));
}

// ─────────────────────────────────────────────────────────────────
// Persona & Seed Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_persona_list_empty_store() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("persona")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No personas."));
}

#[test]
fn test_seed_import() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("seed")
        .arg(common::fixture_path("seed.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"personasImported\": 2"))
        .stdout(predicate::str::contains("\"topicsImported\": 2"));
    assert!(ws.snapshot().exists());

    ws.cmd()
        .arg("persona")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("ana-lopez"))
        .stdout(predicate::str::contains("ben-okafor"));

    // Importing again skips what already exists
    ws.cmd()
        .arg("seed")
        .arg(common::fixture_path("seed.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"personasSkipped\": 2"))
        .stdout(predicate::str::contains("\"topicsSkipped\": 2"));
}

#[test]
fn test_deactivate_hides_persona() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["persona", "deactivate", "ben-okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deactivated"));

    ws.cmd()
        .args(["persona", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ben-okafor").not());

    ws.cmd()
        .args(["persona", "list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ben-okafor"));
}

#[test]
fn test_persona_workflow_and_overview() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["persona", "workflow", "ana-lopez", "--threads-per-run", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"threads_per_run\": 2"));

    ws.cmd()
        .args(["persona", "overview"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana Lopez"));
}

#[test]
fn test_topic_add_and_list() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["topic", "add", "Backups that actually restore", "--group", "homelab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"priority\": 5"))
        .stdout(predicate::str::contains("\"group\": \"homelab\""));

    ws.cmd()
        .args(["topic", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backups that actually restore"))
        .stdout(predicate::str::contains("homelab"));

    ws.cmd().args(["topic", "add", "   "]).assert().code(80);
}

#[test]
fn test_persona_activity_after_seeding() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["persona", "activity"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No persona activity."));

    ws.cmd()
        .args(["seed-thread", "--persona", "ana-lopez"])
        .assert()
        .success();

    ws.cmd()
        .args(["persona", "activity", "-n", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana Lopez"))
        .stdout(predicate::str::contains("created_thread"));
}

// ─────────────────────────────────────────────────────────────────
// Action Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_seed_thread_by_slug() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["seed-thread", "--persona", "ana-lopez"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"persona\": \"Ana Lopez\""))
        .stdout(predicate::str::contains("\"slug\""));

    let snapshot = fs::read_to_string(ws.snapshot()).unwrap();
    assert!(snapshot.contains("\"threads\": ["));
    assert!(snapshot.contains("persona-ana-lopez@"));
}

#[test]
fn test_cycle_prints_summary() {
    let ws = Workspace::seeded();
    ws.cmd()
        .arg("cycle")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"threadsSeeded\""))
        .stdout(predicate::str::contains("\"repliesMade\""))
        .stdout(predicate::str::contains("\"errors\""));
}

#[test]
fn test_reply_to_missing_thread() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["reply", "no-such-thread"])
        .assert()
        .code(30)
        .stderr(predicate::str::contains("E303"));
}

#[test]
fn test_run_all_without_workflows() {
    let ws = Workspace::seeded();
    ws.cmd()
        .arg("run-all")
        .assert()
        .code(30)
        .stderr(predicate::str::contains("E300"));
}

#[test]
fn test_run_with_invalid_config() {
    engine_cmd()
        .arg("run")
        .arg("--config")
        .arg("/nonexistent/config.toml")
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────
// Verbosity Flag Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_verbose_flag() {
    engine_cmd().arg("-v").arg("version").assert().success();
}

#[test]
fn test_quiet_flag() {
    engine_cmd().arg("--quiet").arg("version").assert().success();
}

// ─────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_command() {
    engine_cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    engine_cmd().assert().failure();
}
