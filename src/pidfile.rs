//! Master PID file and the single-master guard built on it.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    constants::PID_TMP_SUFFIX,
    error::{PidFileError, SupervisorError},
    process::pid_is_alive,
};

/// Plain-text file holding the decimal pid of the running master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the recorded pid; `Ok(None)` when the file does not exist.
    pub fn read(&self) -> Result<Option<u32>, PidFileError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PidFileError::ReadError(err)),
        };

        let trimmed = contents.trim();
        trimmed
            .parse::<u32>()
            .map(Some)
            .map_err(|_| PidFileError::ParseError(trimmed.to_string()))
    }

    /// Writes `pid`, replacing any previous contents in a single rename.
    pub fn write(&self, pid: u32) -> Result<(), PidFileError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(PidFileError::WriteError)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(PID_TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, pid.to_string()).map_err(PidFileError::WriteError)?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            PidFileError::WriteError(err)
        })
    }

    /// Deletes the file. Returns whether a file was removed; failures are logged.
    pub fn remove(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!("Failed to remove PID file {:?}: {err}", self.path);
                false
            }
        }
    }

    /// Returns the recorded pid if that process is still alive.
    pub fn live_pid(&self) -> Option<u32> {
        match self.read() {
            Ok(Some(pid)) if pid_is_alive(pid) => Some(pid),
            _ => None,
        }
    }
}

/// Keeps a second master from starting while one is alive.
///
/// This is a best-effort liveness probe, not a lock: the check and the later
/// claim are separate steps.
pub struct SingletonGuard;

impl SingletonGuard {
    /// Fails with [`SupervisorError::AlreadyRunning`] if the file names a live process.
    pub fn check(pid_file: &PidFile) -> Result<(), SupervisorError> {
        match pid_file.read() {
            Ok(Some(pid)) if pid_is_alive(pid) => Err(SupervisorError::AlreadyRunning {
                pid,
                path: pid_file.path().to_path_buf(),
            }),
            Ok(Some(pid)) => {
                info!("Ignoring stale PID file {:?} (PID {pid} not running)", pid_file.path());
                Ok(())
            }
            Ok(None) => {
                debug!("No PID file at {:?}", pid_file.path());
                Ok(())
            }
            Err(err) => {
                warn!("Ignoring unusable PID file {:?}: {err}", pid_file.path());
                Ok(())
            }
        }
    }

    /// Records `pid` as the owning master.
    pub fn claim(pid_file: &PidFile, pid: u32) -> Result<(), SupervisorError> {
        pid_file.write(pid)?;
        debug!("Recorded master PID {pid} in {:?}", pid_file.path());
        Ok(())
    }
}
