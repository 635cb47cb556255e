//! Tracing setup for the master and worker processes.
//!
//! Every process logs to stderr and, when the log directory is usable, to a
//! plain-text file in it: `master.log` for the master, `worker.log` shared by
//! all workers. Writes are synchronous; no background writer thread is started.
use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::constants::{MASTER_LOG_FILE, WORKER_LOG_FILE};

/// Which process is logging, and therefore which file it appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    Master,
    Worker,
}

impl LogDestination {
    pub fn file_name(&self) -> &'static str {
        match self {
            LogDestination::Master => MASTER_LOG_FILE,
            LogDestination::Worker => WORKER_LOG_FILE,
        }
    }

    /// Full path of the log file inside `log_dir`.
    pub fn path_in(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(self.file_name())
    }
}

/// Builds the filter from an explicit level, then `RUST_LOG`, then `info`.
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn file_appender(log_dir: &Path, destination: LogDestination) -> Option<RollingFileAppender> {
    std::fs::create_dir_all(log_dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(destination.file_name())
        .build(log_dir)
        .ok()
}

/// Installs the global subscriber. Later calls are ignored.
///
/// Falls back to stderr only when the log directory cannot be created.
pub fn init(log_dir: &Path, destination: LogDestination, level: Option<&str>) {
    let filter = build_filter(level);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let result = match file_appender(log_dir, destination) {
        Some(appender) => {
            let file_layer = fmt::layer().with_ansi(false).with_writer(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
        }
        None => {
            let init = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            tracing::warn!(
                "Log directory {:?} is not writable; logging to stderr only",
                log_dir
            );
            init
        }
    };

    report_install(result);
}

/// A second install keeps the existing subscriber; say so on stderr.
fn report_install<E: std::fmt::Display>(result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            eprintln!("jobsd: log subscriber not installed: {err}");
            false
        }
    }
}

/// Stderr-only logging for commands that never touch the log directory.
pub fn init_stderr(level: Option<&str>) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_writer(std::io::stderr)
        .try_init();
    report_install(result);
}
