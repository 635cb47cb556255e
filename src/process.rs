//! Process plumbing: spawning, signalling, reaping and renaming OS processes.
use std::{
    ffi::OsString,
    io,
    os::unix::{io::IntoRawFd, process::CommandExt},
    path::PathBuf,
    process::Command,
};

use nix::{
    errno::Errno,
    sys::{
        signal::{self, Signal},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
    unistd::Pid,
};
use tracing::{debug, warn};

use crate::constants::{WORKER_KILL_SIGNAL, worker_display_name};

/// Exit information for a reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// PID of the child that terminated.
    pub pid: u32,
    /// Exit status if the child exited normally.
    pub exit_code: Option<i32>,
    /// Signal number if the child was killed by a signal.
    pub signal: Option<i32>,
}

impl ChildExit {
    pub fn exited(pid: u32, code: i32) -> Self {
        Self {
            pid,
            exit_code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(pid: u32, signal: i32) -> Self {
        Self {
            pid,
            exit_code: None,
            signal: Some(signal),
        }
    }

    /// Signal number for log lines; 0 when the child exited on its own.
    pub fn kill_signal(&self) -> i32 {
        self.signal.unwrap_or(0)
    }
}

/// The operations the master needs from the operating system.
///
/// [`SystemProcesses`] is the real implementation; tests substitute a scripted one.
pub trait ProcessControl {
    /// Starts a worker process for `(slot_id, topic)` and returns its pid.
    fn spawn(&mut self, slot_id: usize, topic: &str) -> io::Result<u32>;

    /// Sends the forced-stop signal to a worker.
    fn kill(&mut self, pid: u32) -> io::Result<()>;

    /// Collects one terminated child without blocking, or `None` when none is pending.
    fn try_reap(&mut self) -> io::Result<Option<ChildExit>>;
}

/// Spawns workers by re-executing the current binary in worker mode.
#[derive(Debug, Clone)]
pub struct SystemProcesses {
    program: PathBuf,
    config_path: PathBuf,
    process_name: String,
    log_level: Option<String>,
}

impl SystemProcesses {
    /// Creates a launcher that re-runs the current executable.
    pub fn new(config_path: PathBuf, process_name: impl Into<String>) -> io::Result<Self> {
        Ok(Self::with_program(
            std::env::current_exe()?,
            config_path,
            process_name,
        ))
    }

    /// Creates a launcher for an explicit worker executable.
    pub fn with_program(
        program: PathBuf,
        config_path: PathBuf,
        process_name: impl Into<String>,
    ) -> Self {
        Self {
            program,
            config_path,
            process_name: process_name.into(),
            log_level: None,
        }
    }

    /// Forwards a log level override to every worker.
    pub fn with_log_level(mut self, level: Option<&str>) -> Self {
        self.log_level = level.map(str::to_string);
        self
    }

    pub(crate) fn worker_command(&self, slot_id: usize, topic: &str, master_pid: u32) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg0(worker_display_name(
            slot_id,
            topic,
            master_pid,
            &self.process_name,
        ));

        if let Some(level) = &self.log_level {
            cmd.arg("--log-level").arg(level);
        }

        let args: [OsString; 9] = [
            "worker".into(),
            "--config".into(),
            self.config_path.clone().into_os_string(),
            "--slot".into(),
            slot_id.to_string().into(),
            "--topic".into(),
            topic.into(),
            "--master-pid".into(),
            master_pid.to_string().into(),
        ];
        cmd.args(args);

        // Own process group so a forced stop also reaches the task's children.
        cmd.process_group(0);
        cmd
    }
}

impl ProcessControl for SystemProcesses {
    fn spawn(&mut self, slot_id: usize, topic: &str) -> io::Result<u32> {
        let mut cmd = self.worker_command(slot_id, topic, std::process::id());
        debug!("Executing worker command: {cmd:?}");
        let child = cmd.spawn()?;
        Ok(child.id())
    }

    fn kill(&mut self, pid: u32) -> io::Result<()> {
        let target = Pid::from_raw(pid as i32);

        match signal::killpg(target, WORKER_KILL_SIGNAL) {
            Ok(()) => return Ok(()),
            Err(Errno::ESRCH) => {}
            Err(Errno::EPERM) => {
                warn!(
                    "Insufficient permissions to signal process group {pid}. Falling back to direct signal"
                );
            }
            Err(err) => return Err(err.into()),
        }

        match signal::kill(target, WORKER_KILL_SIGNAL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn try_reap(&mut self) -> io::Result<Option<ChildExit>> {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    return Ok(Some(ChildExit::exited(pid.as_raw() as u32, code)));
                }
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    return Ok(Some(ChildExit::signaled(
                        pid.as_raw() as u32,
                        signal as i32,
                    )));
                }
                Ok(WaitStatus::StillAlive) => return Ok(None),
                Ok(other) => {
                    debug!("Ignoring non-terminal wait status {other:?}");
                }
                Err(Errno::ECHILD) => return Ok(None),
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Returns whether `pid` names a live process.
///
/// A process we may not signal (`EPERM`) still counts as alive.
pub fn pid_is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Delivers `signal` to `pid`.
pub fn send_signal(pid: u32, signal: Signal) -> nix::Result<()> {
    let raw = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
    signal::kill(Pid::from_raw(raw), signal)
}

/// Renames the calling process for `ps`/`top`. Returns `false` where unsupported.
#[cfg(target_os = "linux")]
pub fn set_process_name(name: &str) -> bool {
    let Ok(name) = std::ffi::CString::new(name) else {
        return false;
    };
    // The kernel truncates to 15 bytes; the full name is carried in argv[0].
    unsafe { libc::prctl(libc::PR_SET_NAME, name.as_ptr() as libc::c_ulong, 0, 0, 0) == 0 }
}

#[cfg(not(target_os = "linux"))]
pub fn set_process_name(_name: &str) -> bool {
    false
}

/// Detaches from the controlling terminal with a double fork.
pub fn daemonize() -> io::Result<()> {
    if unsafe { libc::fork() } > 0 {
        std::process::exit(0);
    }

    unsafe {
        libc::setsid();
    }

    if unsafe { libc::fork() } > 0 {
        std::process::exit(0);
    }

    std::env::set_current_dir("/")?;
    let devnull = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")?;
    let fd = devnull.into_raw_fd();
    unsafe {
        let _ = libc::dup2(fd, libc::STDIN_FILENO);
        let _ = libc::dup2(fd, libc::STDOUT_FILENO);
        let _ = libc::dup2(fd, libc::STDERR_FILENO);
        libc::close(fd);
    }

    Ok(())
}
