//! Integration tests for the MAGI CLI.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_VARS: [&str; 4] = [
    "OPENAI_API_KEY",
    "GEMINI_API_KEY",
    "XAI_API_KEY",
    "ANTHROPIC_API_KEY",
];

/// The binary with no provider credentials or model overrides inherited.
fn magi_bin() -> Command {
    let mut cmd = Command::cargo_bin("magi").expect("binary is built");
    for var in KEY_VARS {
        cmd.env_remove(var);
    }
    for var in ["OPENAI_MODEL", "GEMINI_MODEL", "XAI_MODEL", "ANTHROPIC_MODEL", "JUDGE_MODEL"] {
        cmd.env_remove(var);
    }
    cmd
}

/// Writes a config whose openai and anthropic providers point at `base_url`.
fn write_config(dir: &Path, base_url: &str) -> std::path::PathBuf {
    let config_path = dir.join("magi.toml");
    let content = format!(
        r#"[general]
log_level = "warn"

[providers.openai]
base_url = "{base_url}"

[providers.gemini]
enabled = false

[providers.xai]
enabled = false

[providers.anthropic]
base_url = "{base_url}"

[consensus]
timeout_ms = 2000
"#
    );
    fs::write(&config_path, content).expect("Failed to write config");
    config_path
}

#[test]
fn test_version_command() {
    magi_bin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("magi"));
}

#[test]
fn test_help_command() {
    magi_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("serve"))
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("consensus"))
                .and(predicate::str::contains("compare"))
                .and(predicate::str::contains("doctor")),
        );
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("magi.toml");

    magi_bin()
        .arg("init")
        .arg("--path")
        .arg(temp_dir.path())
        .assert()
        .success();

    assert!(config_path.exists(), "Config file was not created");

    let content = fs::read_to_string(&config_path).expect("Failed to read config");
    assert!(content.contains("[general]"));
    assert!(content.contains("[providers"));
    assert!(content.contains("[consensus]"));
    assert!(content.contains("[judge]"));
}

#[test]
fn test_init_keeps_existing_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "http://127.0.0.1:9");
    let before = fs::read_to_string(&config_path).unwrap();

    magi_bin()
        .arg("init")
        .arg("--path")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), before);
}

#[test]
fn test_status_lists_providers() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "http://127.0.0.1:9");

    magi_bin()
        .arg("--config")
        .arg(&config_path)
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("openai")
                .and(predicate::str::contains("anthropic"))
                .and(predicate::str::contains("Judge:")),
        );
}

#[test]
fn test_doctor_reports_missing_keys() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "http://127.0.0.1:9");

    magi_bin()
        .arg("--config")
        .arg(&config_path)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("OPENAI_API_KEY is not set"));
}

#[test]
fn test_consensus_requires_prompt() {
    magi_bin().arg("consensus").assert().failure();
}

#[test]
fn test_consensus_rejects_unknown_provider() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "http://127.0.0.1:9");

    magi_bin()
        .arg("--config")
        .arg(&config_path)
        .args(["consensus", "hi", "--providers", "openai,mistral"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mistral"));
}

#[test]
fn test_consensus_without_credentials_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "http://127.0.0.1:9");

    magi_bin()
        .arg("--config")
        .arg(&config_path)
        .args(["consensus", "2+2?", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("OPENAI_API_KEY not set"))
        .stderr(predicate::str::contains("no_valid_answers"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_consensus_against_mock_vendors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "4"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "4."}]
        })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), &server.uri());

    let output = magi_bin()
        .arg("--config")
        .arg(&config_path)
        .args(["consensus", "What is 2+2?", "--json"])
        .env("OPENAI_API_KEY", "test-key")
        .env("ANTHROPIC_API_KEY", "test-key")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let response: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(response["decidedBy"], "majority");
    assert_eq!(response["final"], "4");
    assert_eq!(response["results"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_compare_reads_prompt_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Ruby"}}]
        })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), &server.uri());
    let prompt_path = temp_dir.path().join("prompt.txt");
    fs::write(&prompt_path, "Name a gemstone.").unwrap();

    magi_bin()
        .arg("--config")
        .arg(&config_path)
        .arg("compare")
        .arg(format!("@{}", prompt_path.display()))
        .args(["-p", "openai,anthropic"])
        .env("OPENAI_API_KEY", "test-key")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Ruby")
                .and(predicate::str::contains("ANTHROPIC_API_KEY not set")),
        );
}

#[test]
fn test_invalid_command() {
    magi_bin()
        .arg("invalid-command-that-does-not-exist")
        .assert()
        .failure();
}

#[test]
fn test_verbose_flag() {
    magi_bin().arg("-v").arg("version").assert().success();
}

#[test]
fn test_quiet_flag() {
    magi_bin().arg("-q").arg("version").assert().success();
}
