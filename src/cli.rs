//! Command-line interface for jobsd.
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let lowercase = trimmed.to_ascii_lowercase();
        let level = match lowercase.as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for jobsd.
#[derive(Parser, Debug)]
#[command(name = "jobsd", version, author)]
#[command(about = "Keeps a pool of topic workers alive under one master process", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for jobsd.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the master and its workers.
    Start {
        /// Path to the configuration file (defaults to `jobsd.yaml`).
        #[arg(short, long, default_value = "jobsd.yaml")]
        config: String,

        /// Stay attached to the terminal instead of daemonizing.
        #[arg(long)]
        foreground: bool,
    },

    /// Kill all workers and stop the running master.
    Stop {
        /// Path to the configuration file (defaults to `jobsd.yaml`).
        #[arg(short, long, default_value = "jobsd.yaml")]
        config: String,
    },

    /// Let workers finish their current task, then stop the master.
    Drain {
        /// Path to the configuration file (defaults to `jobsd.yaml`).
        #[arg(short, long, default_value = "jobsd.yaml")]
        config: String,
    },

    /// Report whether a master is running.
    Status {
        /// Path to the configuration file (defaults to `jobsd.yaml`).
        #[arg(short, long, default_value = "jobsd.yaml")]
        config: String,
    },

    /// Run a single worker. Invoked by the master.
    #[command(hide = true)]
    Worker {
        /// Path to the configuration file.
        #[arg(short, long)]
        config: String,

        /// Slot occupied by this worker.
        #[arg(long)]
        slot: usize,

        /// Topic to consume.
        #[arg(long)]
        topic: String,

        /// PID of the master that launched this worker.
        #[arg(long)]
        master_pid: u32,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
