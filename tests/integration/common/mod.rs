#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

pub fn jobsd_bin() -> &'static Path {
    assert_cmd::cargo::cargo_bin!("jobsd")
}

/// Writes `jobsd.yaml` into `dir` and returns its path.
pub fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("jobsd.yaml");
    fs::write(&path, body).expect("failed to write config");
    path
}

/// Launches a foreground master as a child of the test process.
pub fn spawn_foreground_master(config: &Path) -> Child {
    Command::new(jobsd_bin())
        .arg("start")
        .arg("--foreground")
        .arg("--config")
        .arg(config)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn jobsd master")
}

pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

pub fn wait_for_pid_file(path: &Path) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(pid) = read_pid(path) {
            return pid;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for PID file {:?}", path);
        }

        thread::sleep(Duration::from_millis(100));
    }
}

pub fn wait_for_path_removed(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for {:?} to be removed", path);
}

/// Live (non-zombie) direct children of `parent`, sorted by pid.
pub fn child_pids(parent: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(_, process)| process.parent() == Some(Pid::from_u32(parent)))
        .filter(|(_, process)| !matches!(process.status(), ProcessStatus::Zombie))
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();
    pids
}

/// Waits until `parent` has exactly `count` live children accepted by `accept`.
pub fn wait_for_children<F>(parent: u32, count: usize, accept: F) -> Vec<u32>
where
    F: Fn(&[u32]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let pids = child_pids(parent);
        if pids.len() == count && accept(&pids) {
            return pids;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for {count} workers under {parent}; saw {pids:?}");
        }

        thread::sleep(Duration::from_millis(100));
    }
}

pub fn wait_for_child_exit(child: &mut Child) -> std::process::ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().expect("failed to poll master") {
            return status;
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("Timed out waiting for master {} to exit", child.id());
        }

        thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(target_os = "linux")]
pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    let proc_path = PathBuf::from(format!("/proc/{}", pid));
    let stat_path = PathBuf::from(format!("/proc/{}/stat", pid));

    while Instant::now() < deadline {
        if !proc_path.exists() {
            return;
        }

        // Third field of /proc/<pid>/stat is the state; Z and X mean dead.
        if let Ok(stat) = fs::read_to_string(&stat_path)
            && let Some(state_start) = stat.rfind(')')
            && let Some(state_char) = stat[state_start + 1..].trim().chars().next()
            && (state_char == 'Z' || state_char == 'X')
        {
            return;
        }

        thread::sleep(Duration::from_millis(100));
    }

    panic!("Timed out waiting for PID {} to exit", pid);
}

/// First element of the process's argv, as shown by `ps`.
#[cfg(target_os = "linux")]
pub fn process_arg0(pid: u32) -> Option<String> {
    let raw = fs::read(format!("/proc/{pid}/cmdline")).ok()?;
    let arg0 = raw.split(|byte| *byte == 0).next()?;
    Some(String::from_utf8_lossy(arg0).into_owned())
}

pub fn wait_for_log(path: &Path, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(contents) = fs::read_to_string(path)
            && contents.contains(needle)
        {
            return contents;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for '{needle}' in {:?}", path);
        }

        thread::sleep(Duration::from_millis(100));
    }
}
