//! jobsd runs a master process that keeps a fixed pool of worker processes
//! alive, one pool per topic. Dead workers are respawned while the master is
//! running; a drain signal lets workers finish before the master exits, and a
//! stop signal kills them at once.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Constants and defaults.
pub mod constants;

/// Error handling.
pub mod error;

/// Logging setup.
pub mod logs;

/// Master state machine and signal loop.
pub mod master;

/// PID file and single-master guard.
pub mod pidfile;

/// OS process plumbing.
pub mod process;

/// Live worker bookkeeping.
pub mod registry;

/// Tasks executed by workers.
pub mod task;

/// Topics and slot resolution.
pub mod topics;

/// Worker handles and worker-mode entry point.
pub mod worker;

#[cfg(test)]
mod test_utils;
