//! Integration tests for the `docknet` binary.
//!
//! The daemon program is pointed at a path that does not exist, so every
//! command that needs the daemon fails its precheck deterministically.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command with env isolation and a private marker directory.
fn docknet_cmd(data_dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("docknet");
    cmd.env("DOCKNET_DOCKER_BIN", "/nonexistent/docknet-test/docker")
        .env("DOCKNET_DATA_DIR", data_dir.path())
        .env_remove("DOCKNET_MACHINE_ID")
        .env_remove("DOCKNET_VERBOSE")
        .env_remove("DOCKNET_LOG")
        .env_remove("DOCKNET_CONFLICT_POLICY")
        .env_remove("DOCKNET_SKIP_CONFLICTS")
        .env_remove("DOCKNET_DESTROY_WITH_CONTAINERS")
        .env_remove("RUST_LOG");
    cmd
}

fn envelope(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_usage() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    docknet_cmd(&dir).arg("--help").assert().success().stdout(
        predicate::str::contains("init")
            .and(predicate::str::contains("destroy"))
            .and(predicate::str::contains("prune"))
            .and(predicate::str::contains("rename"))
            .and(predicate::str::contains("reload")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    docknet_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("docknet"));
}

#[test]
fn test_version_command_json() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir).args(["version", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let body = envelope(&output);
    assert_eq!(body["action"], "version");
    assert_eq!(body["status"], "success");
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(body.get("error").is_none());
}

// ── Daemon precheck ─────────────────────────────────────────────────

#[test]
fn test_list_without_daemon_exits_two() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir).args(["list", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    let body = envelope(&output);
    assert_eq!(body["action"], "list");
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 2);
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
}

#[test]
fn test_destroy_json_skips_prompt() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir)
        .args(["--json", "destroy", "net-a"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(envelope(&output)["action"], "destroy");
}

#[test]
fn test_text_errors_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    docknet_cmd(&dir)
        .arg("prune")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error: network daemon is unavailable"));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_invalid_name_fails_before_precheck() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir)
        .args(["info", "bad/name", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let body = envelope(&output);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("invalid network name"));
}

#[test]
fn test_up_requires_machine_id() {
    let dir = TempDir::new().unwrap();
    docknet_cmd(&dir)
        .arg("up")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--machine-id"));
}

#[test]
fn test_up_rejects_unknown_driver() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir)
        .args(["up", "--machine-id", "3f2a9c1e", "--driver", "overlay", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(envelope(&output)["error"]
        .as_str()
        .unwrap()
        .contains("overlay"));
}

#[test]
fn test_machine_id_from_env() {
    let dir = TempDir::new().unwrap();
    let output = docknet_cmd(&dir)
        .env("DOCKNET_MACHINE_ID", "3f2a9c1e")
        .args(["down", "--json"])
        .output()
        .unwrap();
    // Parsed fine; the missing daemon is what stops it.
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(envelope(&output)["action"], "down");
}
