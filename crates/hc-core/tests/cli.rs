//! CLI surface tests for hc-core.
//!
//! Only commands that do not touch the host state are exercised here.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the hc-core binary with a quiet, isolated environment.
fn hc_core() -> Command {
    let mut cmd = Command::cargo_bin("hc-core").expect("hc-core binary should exist");
    cmd.env_remove("HOSTCHECK_CONFIG")
        .env_remove("HOSTCHECK_CONFIG_DIR")
        .env("HC_LOG", "error");
    cmd
}

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("harness.json");
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

mod help {
    use super::*;

    #[test]
    fn top_level_help_lists_commands() {
        hc_core()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("check"))
            .stdout(predicate::str::contains("device"))
            .stdout(predicate::str::contains("config"));
    }

    #[test]
    fn check_help_lists_scenarios() {
        hc_core()
            .args(["check", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("timesync"))
            .stdout(predicate::str::contains("ring-buffer"));
    }

    #[test]
    fn version_command_reports_json() {
        hc_core()
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\":\"hc-core\""));
    }
}

mod args {
    use super::*;

    #[test]
    fn unknown_command_is_args_error() {
        hc_core()
            .arg("nonexistent-command")
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn unknown_capability_is_args_error() {
        hc_core()
            .args(["tool", "resolve", "dpdk"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("time-sync-client"));
    }

    #[test]
    fn ring_size_must_be_numeric() {
        hc_core()
            .args(["check", "ring-buffer", "--rx", "lots"])
            .assert()
            .code(10);
    }
}

mod config {
    use super::*;

    #[test]
    fn show_reports_file_values() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"timesync": {"servers": ["time.example.org"]}, "network": {"ring_buffer_rx": 4096, "ring_buffer_tx": 512}}"#,
        );

        hc_core()
            .args(["--config", &path, "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("time.example.org"))
            .stdout(predicate::str::contains("\"source\": \"cli_argument\""))
            .stdout(predicate::str::contains("4096"));
    }

    #[test]
    fn show_human_names_source() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{}");

        hc_core()
            .args(["--config", &path, "--format", "human", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Source:"))
            .stdout(predicate::str::contains("0.pool.ntp.org"));
    }

    #[test]
    fn validate_accepts_good_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"schema_version": "1.2.0"}"#);

        hc_core()
            .args(["config", "validate", &path])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"valid\": true"));
    }

    #[test]
    fn validate_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{not json");

        hc_core()
            .args(["config", "validate", &path])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("\"code\": 11"));
    }

    #[test]
    fn validate_rejects_empty_server_list() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"timesync": {"servers": []}}"#);

        hc_core()
            .args(["--format", "human", "config", "validate", &path])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("Fix:"));
    }

    #[test]
    fn missing_explicit_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        hc_core()
            .args(["--config", &path.to_string_lossy(), "config", "show"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("absent.json"));
    }
}
