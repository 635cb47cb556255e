//! The master process: owns the worker pool and reacts to signals.
//!
//! All supervisor state lives on one [`Master`] value. The run loop blocks the
//! supervised signals, waits for them synchronously and hands each to
//! [`Master::dispatch`], so registry mutation happens on a single thread one
//! signal at a time.
use std::{fmt, io, thread, time::Duration};

use chrono::Local;
use nix::sys::signal::{SigSet, Signal};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, error, info, warn};

use crate::{
    config::Settings,
    constants::{CHILD_EXIT_SIGNAL, DRAIN_SIGNAL, FORCE_STOP_SIGNALS, master_display_name},
    error::SupervisorError,
    pidfile::{PidFile, SingletonGuard},
    process::{ChildExit, ProcessControl, set_process_name},
    registry::WorkerRegistry,
    topics::{TopicSource, resolve_slots},
    worker::Worker,
};

/// Lifecycle state of the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MasterStatus {
    /// Dead workers are respawned.
    Running,
    /// No respawns; the master exits once the last worker is reaped.
    Draining,
    /// Terminal.
    Stopped,
}

impl MasterStatus {
    /// Whether moving from `self` to `next` is allowed. Transitions only move
    /// towards `Stopped`.
    pub fn can_transition_to(self, next: MasterStatus) -> bool {
        matches!(
            (self, next),
            (MasterStatus::Running, MasterStatus::Draining)
                | (MasterStatus::Running, MasterStatus::Stopped)
                | (MasterStatus::Draining, MasterStatus::Stopped)
        )
    }
}

/// Signal kinds the master reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterSignal {
    /// One or more children terminated.
    ChildExited,
    /// Stop respawning and exit when the pool is empty.
    Drain,
    /// Kill every worker and exit now.
    ForceStop,
}

impl MasterSignal {
    pub fn from_signal(signal: Signal) -> Option<Self> {
        if signal == CHILD_EXIT_SIGNAL {
            Some(Self::ChildExited)
        } else if signal == DRAIN_SIGNAL {
            Some(Self::Drain)
        } else if FORCE_STOP_SIGNALS.contains(&signal) {
            Some(Self::ForceStop)
        } else {
            None
        }
    }

    /// The set of signals the run loop blocks and waits on.
    pub fn sigset() -> SigSet {
        let mut set = SigSet::empty();
        set.add(CHILD_EXIT_SIGNAL);
        set.add(DRAIN_SIGNAL);
        for signal in FORCE_STOP_SIGNALS {
            set.add(signal);
        }
        set
    }
}

/// What the run loop should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Supervisor for a pool of topic workers.
pub struct Master<P: ProcessControl> {
    pid: u32,
    pid_file: PidFile,
    status: MasterStatus,
    registry: WorkerRegistry,
    procs: P,
    shutdown_grace: Duration,
}

impl<P: ProcessControl> fmt::Debug for Master<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Master")
            .field("pid", &self.pid)
            .field("pid_file", &self.pid_file)
            .field("status", &self.status)
            .field("workers", &self.registry.len())
            .finish()
    }
}

impl<P: ProcessControl> Master<P> {
    /// Builds a master around an already-claimed PID file.
    pub fn new(pid: u32, pid_file: PidFile, procs: P, shutdown_grace: Duration) -> Self {
        Self {
            pid,
            pid_file,
            status: MasterStatus::Running,
            registry: WorkerRegistry::new(),
            procs,
            shutdown_grace,
        }
    }

    /// Runs the startup sequence: refuse to start if a live master owns the PID
    /// file, call `detach` (daemonize or no-op), then record our own pid.
    pub fn launch<F>(settings: &Settings, procs: P, detach: F) -> Result<Self, SupervisorError>
    where
        F: FnOnce() -> io::Result<()>,
    {
        let pid_file = PidFile::new(&settings.pid_file);
        SingletonGuard::check(&pid_file)?;

        detach()?;

        let pid = std::process::id();
        SingletonGuard::claim(&pid_file, pid)?;
        set_process_name(&master_display_name(pid, &settings.process_name));
        info!("Master {pid} started, PID file {:?}", pid_file.path());

        Ok(Self::new(pid, pid_file, procs, settings.shutdown_grace))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> MasterStatus {
        self.status
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn procs(&self) -> &P {
        &self.procs
    }

    /// Launches one worker per slot resolved from the current topic snapshot.
    pub fn start(&mut self, source: &dyn TopicSource) -> Result<(), SupervisorError> {
        let topics = source.topics()?;
        match serde_json::to_string(&topics) {
            Ok(json) => info!("topics: {json}"),
            Err(err) => warn!("Failed to serialise topics for logging: {err}"),
        }

        let slots = resolve_slots(&topics);
        if slots.is_empty() {
            warn!("No worker slots resolved from topics; waiting for a stop signal");
        }

        for slot in slots {
            let mut worker = Worker::new(slot);
            match worker.spawn(&mut self.procs) {
                Ok(pid) => {
                    info!("worker id: {} pid: {pid} is start...", worker.slot_id());
                    self.registry.insert(pid, worker);
                }
                Err(err) => error!("{err}"),
            }
        }

        info!("Worker count: {}", self.registry.len());
        Ok(())
    }

    /// Starts the pool and processes signals until the master should exit.
    pub fn run(&mut self, source: &dyn TopicSource) -> Result<(), SupervisorError> {
        // Blocked before the first spawn so early worker exits stay pending.
        let signals = MasterSignal::sigset();
        signals.thread_block()?;

        if let Err(err) = self.start(source) {
            return Err(self.abort(err));
        }

        loop {
            if self.step(signals.wait())? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Handles the outcome of one signal wait. Any failure force-stops the pool
    /// before it is returned, so no worker outlives its supervisor.
    fn step(&mut self, waited: nix::Result<Signal>) -> Result<Flow, SupervisorError> {
        let signal = match waited {
            Ok(signal) => signal,
            Err(err) => return Err(self.abort(err.into())),
        };

        let Some(event) = MasterSignal::from_signal(signal) else {
            debug!("Ignoring unexpected signal {signal:?}");
            return Ok(Flow::Continue);
        };

        debug!("Master received {signal:?}");
        self.dispatch(event).map_err(|err| self.abort(err))
    }

    fn abort(&mut self, err: SupervisorError) -> SupervisorError {
        error!("Master failed, stopping all workers: {err}");
        self.force_stop();
        err
    }

    /// Handles one signal. The only entry point that mutates supervisor state.
    pub fn dispatch(&mut self, signal: MasterSignal) -> Result<Flow, SupervisorError> {
        match signal {
            MasterSignal::ChildExited => self.reap_children(),
            MasterSignal::Drain => Ok(self.request_drain()),
            MasterSignal::ForceStop => Ok(self.force_stop()),
        }
    }

    /// Reaps every pending child exit, then finishes a drain if the pool is empty.
    fn reap_children(&mut self) -> Result<Flow, SupervisorError> {
        while let Some(exit) = self.procs.try_reap()? {
            self.handle_exit(exit);
        }

        if self.registry.is_empty() && self.status == MasterStatus::Draining {
            info!("All workers exited after drain request");
            self.transition(MasterStatus::Stopped);
            return Ok(self.shutdown());
        }

        Ok(Flow::Continue)
    }

    /// Processes one reaped child: respawn its slot while running, then forget the old pid.
    pub fn handle_exit(&mut self, exit: ChildExit) {
        let Some(mut worker) = self.registry.remove(exit.pid) else {
            debug!("Reaped PID {} is not a registered worker", exit.pid);
            return;
        };

        let kill_signal = exit.kill_signal();

        if self.status == MasterStatus::Running {
            match worker.spawn(&mut self.procs) {
                Ok(new_pid) => {
                    info!("Worker Restart, kill_signal={kill_signal} PID={new_pid}");
                    self.registry.insert(new_pid, worker);
                }
                Err(err) => error!("{err}"),
            }
        }

        info!("Worker Exit, kill_signal={kill_signal} PID={}", exit.pid);
        info!("Worker count: {}", self.registry.len());
    }

    /// Stops respawning. Shuts down at once if no workers remain.
    pub fn request_drain(&mut self) -> Flow {
        if !self.transition(MasterStatus::Draining) {
            debug!("Drain request ignored in state {}", self.status);
            return Flow::Continue;
        }

        info!(
            "Drain requested; waiting for {} worker(s) to finish",
            self.registry.len()
        );

        if self.registry.is_empty() {
            self.transition(MasterStatus::Stopped);
            return self.shutdown();
        }

        Flow::Continue
    }

    /// Kills every registered worker and shuts down without waiting for them.
    pub fn force_stop(&mut self) -> Flow {
        if !self.transition(MasterStatus::Stopped) {
            debug!("Stop request ignored; master already stopped");
            return Flow::Exit;
        }

        for pid in self.registry.pids() {
            if let Err(err) = self.procs.kill(pid) {
                warn!("Failed to kill worker {pid}: {err}");
            }
            self.registry.remove(pid);
            info!("Master received stop signal, worker [{pid}] killed");
            info!("Worker count: {}", self.registry.len());
        }

        self.shutdown()
    }

    fn transition(&mut self, next: MasterStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }

        debug!("Master status {} -> {}", self.status, next);
        self.status = next;
        true
    }

    /// Removes the PID file, logs the exit and waits for log writes to land.
    fn shutdown(&mut self) -> Flow {
        self.pid_file.remove();
        info!(
            "Time: {} master {} exited",
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            self.pid
        );

        if !self.shutdown_grace.is_zero() {
            thread::sleep(self.shutdown_grace);
        }

        Flow::Exit
    }
}
