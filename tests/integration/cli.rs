#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::tempdir;

use common::{jobsd_bin, write_config};

const CONFIG: &str = r#"command: "true"
topics:
  - name: orders
    worker_num: 1
"#;

#[test]
fn commands_report_missing_master() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = write_config(temp.path(), CONFIG);

    for command in ["status", "stop", "drain"] {
        Command::new(jobsd_bin())
            .arg(command)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(contains("jobsd master not running"));
    }
}

#[test]
fn missing_config_fails() {
    let temp = tempdir().expect("failed to create tempdir");

    Command::new(jobsd_bin())
        .arg("status")
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(contains("Failed to read config file"));
}

#[test]
fn invalid_config_is_rejected_before_start() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = write_config(
        temp.path(),
        r#"topics:
  - name: orders
    worker_num: 1
"#,
    );

    Command::new(jobsd_bin())
        .arg("start")
        .arg("--foreground")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("no command"));

    assert!(!temp.path().join("master.pid").exists());
}

#[test]
fn help_hides_worker_mode() {
    Command::new(jobsd_bin())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("drain").and(contains("Run a single worker").not()));
}
