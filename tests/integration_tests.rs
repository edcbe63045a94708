//! Integration tests for the wolfpack binary.
//!
//! These exercise the CLI surface end to end; the HTTP behavior of the
//! manager and player servers is covered by the in-crate router tests.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a wolfpack Command
fn wolfpack() -> Command {
    cargo_bin_cmd!("wolfpack")
}

fn write_config(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(format!("{name}.json"));
    fs::write(&path, body).unwrap();
    path
}

const VALID_CONFIG: &str = r#"{
    "server": { "port": 3101 },
    "ai": { "model": "gpt-4o-mini", "provider": "openai" },
    "game": { "name": "Test Wolf", "personality": "calm" }
}"#;

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_wolfpack_help() {
        wolfpack().arg("--help").assert().success();
    }

    #[test]
    fn test_wolfpack_version() {
        wolfpack().arg("--version").assert().success();
    }

    #[test]
    fn test_serve_help_lists_options() {
        wolfpack()
            .args(["serve", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--configs-dir"))
            .stdout(predicate::str::contains("--port"));
    }

    #[test]
    fn test_player_help_lists_options() {
        wolfpack()
            .args(["player", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--config"))
            .stdout(predicate::str::contains("--port"));
    }

    #[test]
    fn test_missing_subcommand_fails() {
        wolfpack().assert().failure();
    }
}

// =============================================================================
// Player startup validation
// =============================================================================

mod player_startup {
    use super::*;

    #[test]
    fn test_player_requires_config_flag() {
        wolfpack().arg("player").assert().failure();
    }

    #[test]
    fn test_player_with_missing_config_fails() {
        wolfpack()
            .args(["player", "--config", "/nonexistent/player.json"])
            .assert()
            .failure();
    }

    #[test]
    fn test_player_with_malformed_config_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "bad", "not json {{");

        wolfpack()
            .args(["player", "--config"])
            .arg(&path)
            .assert()
            .failure();
    }

    #[test]
    fn test_player_with_invalid_config_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "zero-port",
            r#"{
                "server": { "port": 0 },
                "ai": { "model": "gpt-4o-mini", "provider": "openai" }
            }"#,
        );

        wolfpack()
            .args(["player", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("port"));
    }

    #[test]
    fn test_player_with_empty_model_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "no-model",
            r#"{
                "server": { "port": 3101 },
                "ai": { "model": "", "provider": "openai" }
            }"#,
        );

        wolfpack()
            .args(["player", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("model"));
    }

    #[test]
    fn test_player_fails_when_port_already_bound() {
        // Point the player at a port another socket already holds; the
        // config itself parses fine, the bind is what fails.
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "valid", VALID_CONFIG);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        wolfpack()
            .args(["player", "--config"])
            .arg(&path)
            .args(["--port", &port.to_string()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("bind"));
    }
}
