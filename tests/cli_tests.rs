//! CLI Integration Tests for ubo-trace
//!
//! Tests the command-line interface: help output, the init scaffold and
//! configuration validation.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the ubo-trace binary with arguments in an isolated environment
fn run_ubo(args: &[&str], working_dir: &Path, env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ubo-trace"));
    cmd.args(args)
        .arg("--no-color")
        .current_dir(working_dir)
        .env_remove("RUST_LOG")
        .env_remove("APOLLO_API_KEY")
        .env_remove("SEARCHAPI_API_KEY");

    for (key, value) in env {
        cmd.env(key, value);
    }

    cmd.output().expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

const AGENT_ENV: &[(&str, &str)] = &[("LYZR_API_KEY", "test-key"), ("LYZR_USER_ID", "test-user")];

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_ubo(&["--help"], temp_dir.path(), &[]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("UBO Trace"));
    assert!(text.contains("serve"));
    assert!(text.contains("trace"));
    assert!(text.contains("init"));
    assert!(text.contains("config"));
}

#[test]
fn test_version_command() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_ubo(&["--version"], temp_dir.path(), &[]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_trace_help_lists_arguments() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_ubo(&["trace", "--help"], temp_dir.path(), &[]);

    assert!(output.status.success());
    let text = stdout(&output);
    for flag in ["--entity", "--ubo", "--location", "--domain", "--json"] {
        assert!(text.contains(flag), "missing {}", flag);
    }
}

// =============================================================================
// Init Command Tests
// =============================================================================

#[test]
fn test_init_scaffolds_project() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_ubo(&["init", "--port", "9200"], temp_dir.path(), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let config = fs::read_to_string(temp_dir.path().join("ubo.toml")).unwrap();
    assert!(config.contains("port = 9200"));
    assert!(config.contains("[agent.stages.stage_2b]"));
    assert!(temp_dir.path().join(".env.example").exists());
    assert!(temp_dir.path().join(".gitignore").exists());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("ubo.toml"), "# mine").unwrap();

    let output = run_ubo(&["init"], temp_dir.path(), &[]);
    assert!(!output.status.success());
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("ubo.toml")).unwrap(),
        "# mine"
    );

    let forced = run_ubo(&["init", "--force"], temp_dir.path(), &[]);
    assert!(forced.status.success());
    assert_ne!(
        fs::read_to_string(temp_dir.path().join("ubo.toml")).unwrap(),
        "# mine"
    );
}

// =============================================================================
// Config Command Tests
// =============================================================================

#[test]
fn test_config_validate_after_init() {
    let temp_dir = TempDir::new().unwrap();
    assert!(run_ubo(&["init"], temp_dir.path(), &[]).status.success());

    let output = run_ubo(&["config", "--validate"], temp_dir.path(), AGENT_ENV);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("is valid"));
    // No enrichment keys are set, so both are reported disabled
    assert!(text.contains("people search is disabled"));
    assert!(text.contains("domain search is disabled"));
}

#[test]
fn test_config_reports_missing_env_var() {
    let temp_dir = TempDir::new().unwrap();
    assert!(run_ubo(&["init"], temp_dir.path(), &[]).status.success());

    let output = Command::new(env!("CARGO_BIN_EXE_ubo-trace"))
        .args(["config", "--validate", "--no-color"])
        .current_dir(temp_dir.path())
        .env_remove("LYZR_API_KEY")
        .env_remove("LYZR_USER_ID")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("LYZR_API_KEY"));
}

#[test]
fn test_config_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_ubo(
        &["config", "--config", "absent.toml"],
        temp_dir.path(),
        AGENT_ENV,
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("absent.toml"));
}

#[test]
fn test_trace_without_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_ubo(
        &["trace", "-e", "Acme Ltd", "-u", "Jane Doe", "-l", "UK"],
        temp_dir.path(),
        AGENT_ENV,
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("ubo.toml"));
}
