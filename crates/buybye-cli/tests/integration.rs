#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn buybye(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("buybye").unwrap();
    cmd.current_dir(dir.path())
        .env("BUYBYE_CONFIG", dir.path().join("buybye.yaml"))
        .env_remove("RUST_LOG");
    cmd
}

// ---------------------------------------------------------------------------
// buybye init / check
// ---------------------------------------------------------------------------

#[test]
fn init_writes_a_default_config() {
    let dir = TempDir::new().unwrap();
    buybye(&dir).arg("init").assert().success();

    let text = std::fs::read_to_string(dir.path().join("buybye.yaml")).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(value["server"]["base_url"].as_str(), Some("/api"));
    assert_eq!(value["engine"]["max_rounds"].as_u64(), Some(64));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    buybye(&dir).arg("init").assert().success();
    buybye(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    buybye(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn check_passes_without_a_config_file() {
    let dir = TempDir::new().unwrap();
    buybye(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("all rules validate"));
}

#[test]
fn check_fails_on_config_errors() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("buybye.yaml"), "engine:\n  max_rounds: 0\n").unwrap();
    buybye(&dir)
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("engine.max_rounds must be at least 1"));
}

#[test]
fn check_json_reports_warnings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("buybye.yaml"),
        "passthrough:\n  exclusions:\n    - /elsewhere/UserAuth/login\n",
    )
    .unwrap();
    let output = buybye(&dir).args(["check", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["warnings"][0]["level"], "warning");
    assert!(json["syncs"].as_u64().unwrap() > 0);
}

// ---------------------------------------------------------------------------
// buybye syncs / routes
// ---------------------------------------------------------------------------

#[test]
fn syncs_lists_and_shows_rules() {
    let dir = TempDir::new().unwrap();
    buybye(&dir)
        .arg("syncs")
        .assert()
        .success()
        .stdout(predicate::str::contains("LoginRequest"))
        .stdout(predicate::str::contains("SignupCreateProfile"));

    buybye(&dir)
        .args(["syncs", "LoginRequest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("when:"))
        .stdout(predicate::str::contains("UserAuth.login"));

    buybye(&dir)
        .args(["syncs", "NoSuchRule"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no sync named 'NoSuchRule'"));
}

#[test]
fn routes_direct_lists_only_public_aggregates() {
    let dir = TempDir::new().unwrap();
    let output = buybye(&dir)
        .args(["routes", "--direct", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let routes: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["route"].as_str().unwrap())
        .collect();
    assert_eq!(
        routes,
        vec![
            "/api/SwipeSystem/_getCommunitySwipeStats",
            "/api/SwipeSystem/_getSwipeComments",
        ]
    );
}

// ---------------------------------------------------------------------------
// buybye call
// ---------------------------------------------------------------------------

#[test]
fn call_signup_prints_the_session() {
    let dir = TempDir::new().unwrap();
    let output = buybye(&dir)
        .args([
            "call",
            "/api/UserAuth/signup",
            "--body",
            r#"{"email":"ada@example.com","password":"pw"}"#,
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["session"].is_string());
    assert_eq!(json["user"]["email"], "ada@example.com");
}

#[test]
fn call_relays_error_payloads() {
    let dir = TempDir::new().unwrap();
    buybye(&dir)
        .args([
            "call",
            "/api/UserAuth/login",
            "--body",
            r#"{"email":"nobody@example.com","password":"pw"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid credentials."));
}

#[test]
fn call_fails_when_no_rule_responds() {
    let dir = TempDir::new().unwrap();
    buybye(&dir)
        .args(["call", "/api/Nothing/listens"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no response was produced"));
}

#[test]
fn call_rejects_non_object_bodies() {
    let dir = TempDir::new().unwrap();
    buybye(&dir)
        .args(["call", "/api/UserAuth/login", "--body", "[1]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected a JSON object"));
}
