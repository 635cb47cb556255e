#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use nix::{
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use predicates::str::contains;
use tempfile::tempdir;

use common::{
    jobsd_bin, spawn_foreground_master, wait_for_child_exit, wait_for_children, wait_for_log,
    wait_for_path_removed, wait_for_pid_file, write_config,
};

#[test]
fn dead_worker_is_respawned_and_stop_kills_the_pool() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let config = write_config(
        dir,
        r#"shutdown_grace: 0s
command: "sleep 30"
topics:
  - name: alpha
    worker_num: 2
  - name: beta
    workerNum: 1
"#,
    );
    let pid_path = dir.join("master.pid");
    let master_log = dir.join("logs/master.log");

    let mut master = spawn_foreground_master(&config);
    let master_pid = wait_for_pid_file(&pid_path);
    assert_eq!(master_pid, master.id());

    let workers = wait_for_children(master_pid, 3, |_| true);

    #[cfg(target_os = "linux")]
    for pid in &workers {
        let name = common::process_arg0(*pid).unwrap_or_default();
        assert!(
            name.starts_with("job ") && name.ends_with(&format!("master {master_pid}:jobsd")),
            "unexpected worker name {name:?}"
        );
    }

    let victim = workers[0];
    killpg(Pid::from_raw(victim as i32), Signal::SIGKILL).expect("failed to kill worker");

    let respawned = wait_for_children(master_pid, 3, |pids| !pids.contains(&victim));
    assert_eq!(
        respawned.iter().filter(|pid| workers.contains(pid)).count(),
        2,
        "only the killed worker should be replaced"
    );
    wait_for_log(&master_log, "Worker Restart, kill_signal=9");
    wait_for_log(&master_log, &format!("Worker Exit, kill_signal=9 PID={victim}"));

    Command::new(jobsd_bin())
        .arg("stop")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains(format!("pid {master_pid}")));

    let status = wait_for_child_exit(&mut master);
    assert!(status.success(), "master exited with {status:?}");
    assert!(!pid_path.exists(), "PID file should be removed on stop");

    #[cfg(target_os = "linux")]
    for pid in respawned {
        common::wait_for_process_exit(pid);
    }

    let log = wait_for_log(&master_log, &format!("master {master_pid} exited"));
    assert!(log.contains("Worker count: 0"));
}

#[test]
fn drain_lets_workers_finish_then_exits() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let config = write_config(
        dir,
        r#"shutdown_grace: 0s
command: "sleep 2"
topics:
  - name: mail
    worker_num: 2
"#,
    );
    let pid_path = dir.join("master.pid");
    let master_log = dir.join("logs/master.log");

    let mut master = spawn_foreground_master(&config);
    let master_pid = wait_for_pid_file(&pid_path);
    wait_for_children(master_pid, 2, |_| true);

    Command::new(jobsd_bin())
        .arg("drain")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let status = wait_for_child_exit(&mut master);
    assert!(status.success(), "master exited with {status:?}");
    assert!(!pid_path.exists(), "PID file should be removed after drain");

    let log = wait_for_log(&master_log, &format!("master {master_pid} exited"));
    assert!(log.contains("Drain requested"));
    assert!(!log.contains("killed"), "drain must not kill workers");

    let worker_log = dir.join("logs/worker.log");
    wait_for_log(&worker_log, "is done!!!");
}

#[test]
fn daemonized_master_reports_status_and_stops() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let config = write_config(
        dir,
        r#"shutdown_grace: 0s
command: "sleep 30"
topics:
  - name: reports
    worker_num: 1
"#,
    );
    let pid_path = dir.join("master.pid");

    Command::new(jobsd_bin())
        .arg("start")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let master_pid = wait_for_pid_file(&pid_path);
    let workers = wait_for_children(master_pid, 1, |_| true);

    Command::new(jobsd_bin())
        .arg("status")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains(format!("running (pid {master_pid})")));

    Command::new(jobsd_bin())
        .arg("stop")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    wait_for_path_removed(&pid_path);

    #[cfg(target_os = "linux")]
    {
        common::wait_for_process_exit(master_pid);
        common::wait_for_process_exit(workers[0]);
    }

    Command::new(jobsd_bin())
        .arg("status")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("not running"));
}
