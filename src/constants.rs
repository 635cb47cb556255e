//! Constants and default values for the jobsd master and its workers.
//!
//! This module centralizes file names, signal assignments, and defaults used
//! throughout the supervisor.

use std::time::Duration;

use nix::sys::signal::Signal;

// ============================================================================
// File System Constants
// ============================================================================

/// Configuration file looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "jobsd.yaml";

/// Name of the PID file stored in the PID directory.
/// Contains the decimal process id of the running master.
pub const PID_FILE_NAME: &str = "master.pid";

/// Suffix of the scratch file written before the PID file is renamed into place.
pub const PID_TMP_SUFFIX: &str = ".tmp";

/// Log directory used when the configuration does not name one, relative to the app root.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Log file written by the master process.
pub const MASTER_LOG_FILE: &str = "master.log";

/// Log file written by worker processes.
pub const WORKER_LOG_FILE: &str = "worker.log";

// ============================================================================
// Process Naming
// ============================================================================

/// Suffix appended to every process display name so shell tooling can match them.
pub const DEFAULT_PROCESS_NAME: &str = ":jobsd";

/// Builds the display name of the master process.
pub fn master_display_name(pid: u32, prefix: &str) -> String {
    format!("job master {pid}{prefix}")
}

/// Builds the display name of a worker process.
pub fn worker_display_name(slot_id: usize, topic: &str, master_pid: u32, prefix: &str) -> String {
    format!("job {slot_id} {topic} master {master_pid}{prefix}")
}

// ============================================================================
// Signals
// ============================================================================

/// Signal that asks the master to stop respawning and exit once workers finish.
pub const DRAIN_SIGNAL: Signal = Signal::SIGUSR1;

/// Signals that make the master kill every worker and exit immediately.
pub const FORCE_STOP_SIGNALS: [Signal; 2] = [Signal::SIGTERM, Signal::SIGINT];

/// Signal delivered to the master when a worker terminates.
pub const CHILD_EXIT_SIGNAL: Signal = Signal::SIGCHLD;

/// Signal sent to each worker's process group on forced stop.
pub const WORKER_KILL_SIGNAL: Signal = Signal::SIGTERM;

// ============================================================================
// Timing
// ============================================================================

/// Pause between the master's exit message and process exit.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// Shell Execution Constants
// ============================================================================

/// Default shell used for executing task commands.
pub const DEFAULT_SHELL: &str = "sh";

/// Shell argument flag for executing command strings.
pub const SHELL_COMMAND_FLAG: &str = "-c";

/// Placeholder in command templates replaced by the topic name.
pub const TOPIC_PLACEHOLDER: &str = "{topic}";

/// Placeholder in command templates replaced by the slot id.
pub const SLOT_PLACEHOLDER: &str = "{slot}";

/// Environment variable carrying the topic into task commands.
pub const TOPIC_ENV: &str = "JOBSD_TOPIC";

/// Environment variable carrying the slot id into task commands.
pub const SLOT_ENV: &str = "JOBSD_SLOT";

/// Environment variable carrying the master pid into task commands.
pub const MASTER_PID_ENV: &str = "JOBSD_MASTER_PID";
