//! Error handling for jobsd.
use std::path::PathBuf;

use thiserror::Error;

/// Defines all possible errors that can occur in the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Error reading the configuration file.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigReadError {
        /// The configuration path that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// A `${VAR}` reference in the configuration names an unset variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The configuration parsed but cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another live master already owns the PID file.
    #[error("Master already running with PID {pid} (see {path:?}); stop it first")]
    AlreadyRunning {
        /// PID recorded by the running master.
        pid: u32,
        /// The PID file that records it.
        path: PathBuf,
    },

    /// Error spawning a worker process.
    #[error("Failed to start worker {slot_id} for topic '{topic}': {source}")]
    WorkerSpawnError {
        /// Slot the worker occupies.
        slot_id: usize,
        /// Topic the worker consumes.
        topic: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The topic source could not enumerate topics.
    #[error("Failed to load topics: {0}")]
    TopicSource(String),

    /// Error for PID file.
    #[error("PID file error: {0}")]
    PidFileError(#[from] PidFileError),

    /// Error raised by a signal or wait primitive.
    #[error("System call failed: {0}")]
    ErrNo(#[from] nix::errno::Errno),

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for PID file operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Error reading the PID file.
    #[error("Failed to read PID file: {0}")]
    ReadError(#[source] std::io::Error),

    /// The PID file does not contain a decimal process id.
    #[error("Failed to parse PID file contents '{0}'")]
    ParseError(String),

    /// Error writing the PID file.
    #[error("Failed to write PID file: {0}")]
    WriteError(#[source] std::io::Error),
}

/// Error type for task execution inside a worker.
#[derive(Debug, Error)]
pub enum TaskError {
    /// No command was configured for the topic.
    #[error("No command configured for topic '{0}'")]
    MissingCommand(String),

    /// The task command exited with a non-zero status.
    #[error("Task for topic '{topic}' exited with status {code}")]
    NonZeroExit {
        /// Topic the task was consuming.
        topic: String,
        /// Exit status reported by the command.
        code: i32,
    },

    /// The task command was terminated by a signal.
    #[error("Task for topic '{topic}' was terminated by signal {signal}")]
    Signaled {
        /// Topic the task was consuming.
        topic: String,
        /// Signal number that terminated the command.
        signal: i32,
    },

    /// Error launching or waiting on the task command.
    #[error("Task I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Application-defined failure raised by an in-process task.
    #[error("{0}")]
    Failed(String),
}
