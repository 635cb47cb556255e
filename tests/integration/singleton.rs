#[path = "common/mod.rs"]
mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

use common::{
    jobsd_bin, read_pid, spawn_foreground_master, wait_for_child_exit, wait_for_children,
    write_config,
};

const CONFIG: &str = r#"shutdown_grace: 0s
command: "sleep 30"
topics:
  - name: orders
    worker_num: 1
"#;

#[test]
fn second_master_refuses_to_start() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let config = write_config(dir, CONFIG);
    let pid_path = dir.join("master.pid");

    // The test process stands in for a live master.
    let owner = std::process::id().to_string();
    fs::write(&pid_path, &owner).expect("failed to seed PID file");

    Command::new(jobsd_bin())
        .arg("start")
        .arg("--foreground")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("already running"));

    assert_eq!(fs::read_to_string(&pid_path).unwrap(), owner);
}

#[test]
fn stale_pid_file_is_taken_over() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let config = write_config(dir, CONFIG);
    let pid_path = dir.join("master.pid");

    let mut gone = std::process::Command::new("true")
        .spawn()
        .expect("failed to spawn true");
    let stale_pid = gone.id();
    gone.wait().expect("failed to wait for true");
    fs::write(&pid_path, stale_pid.to_string()).expect("failed to seed PID file");

    let mut master = spawn_foreground_master(&config);
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while read_pid(&pid_path) != Some(master.id()) {
        assert!(
            std::time::Instant::now() < deadline,
            "master never claimed the PID file"
        );
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    wait_for_children(master.id(), 1, |_| true);

    Command::new(jobsd_bin())
        .arg("stop")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    assert!(wait_for_child_exit(&mut master).success());
    assert!(!pid_path.exists());
}
