//! Integration tests for the docquery binary
//!
//! None of these reach a backend: `classify` stops before dispatch and the
//! LLM is disabled through the environment.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn docquery_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("docquery").unwrap();
    cmd.env("DOCQUERY_CONFIG", config_dir.path().join("config.yml"))
        .env("DOCQUERY_LLM_ENABLED", "false")
        .env_remove("DOCQUERY_LLM_API_KEY")
        .env_remove("DOCQUERY_STORE_API_KEY")
        .env_remove("DOCQUERY_STORE_API_SECRET")
        .env_remove("DOCQUERY_STORE_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    docquery_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("mcp"));
}

#[test]
fn test_ask_requires_query() {
    let dir = TempDir::new().unwrap();
    docquery_cmd(&dir).arg("ask").assert().failure();
}

#[test]
fn test_classify_list_query() {
    let dir = TempDir::new().unwrap();
    docquery_cmd(&dir)
        .args(["classify", "list", "users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Action:          list"))
        .stdout(predicate::str::contains("Doctype:         User"))
        .stdout(predicate::str::contains("Tool:            list_documents"))
        .stdout(predicate::str::contains("Confidence:      0.95"));
}

#[test]
fn test_classify_json_without_llm_uses_fallback() {
    let dir = TempDir::new().unwrap();
    let output = docquery_cmd(&dir)
        .args(["--format", "json", "classify", "status of project \"Website Redesign\""])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["intent"]["source"], "fallback");
    assert_eq!(json["intent"]["entity_name"], "Website Redesign");
    assert_eq!(json["intent"]["tool"], "get_project_status");
    assert_eq!(json["intent"]["confidence"], 0.5);
}

#[test]
fn test_config_masks_secrets() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.yml"),
        "llm:\n  fallback:\n    model: llama3.1:8b\n    api_key: fb-key\n\nstore:\n  url: https://erp.example.com\n  api_key: abc\n  api_secret: s3cret\n",
    )
    .unwrap();

    docquery_cmd(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://erp.example.com"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("s3cret").not())
        .stdout(predicate::str::contains("fb-key").not());
}

#[test]
fn test_invalid_config_exit_code() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.yml"),
        "routing:\n  search_page_size: 0\n",
    )
    .unwrap();

    docquery_cmd(&dir)
        .arg("config")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("page sizes"));
}
