//! Worker handles on the master side and the worker-mode entry point.
use tracing::{error, info};

use crate::{
    constants::worker_display_name,
    error::SupervisorError,
    process::{ProcessControl, set_process_name},
    task::TaskRunner,
    topics::WorkerSlot,
};

/// Master-side handle for one slot. Re-used across respawns; only `last_pid` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    slot_id: usize,
    topic: String,
    last_pid: Option<u32>,
}

impl Worker {
    pub fn new(slot: WorkerSlot) -> Self {
        Self {
            slot_id: slot.slot_id,
            topic: slot.topic,
            last_pid: None,
        }
    }

    pub fn slot_id(&self) -> usize {
        self.slot_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// PID of the most recent spawn of this slot.
    pub fn last_pid(&self) -> Option<u32> {
        self.last_pid
    }

    /// Starts a fresh process for this slot and records its pid.
    pub fn spawn<P>(&mut self, procs: &mut P) -> Result<u32, SupervisorError>
    where
        P: ProcessControl + ?Sized,
    {
        let pid = procs.spawn(self.slot_id, &self.topic).map_err(|source| {
            SupervisorError::WorkerSpawnError {
                slot_id: self.slot_id,
                topic: self.topic.clone(),
                source,
            }
        })?;

        self.last_pid = Some(pid);
        Ok(pid)
    }
}

/// What a worker process was launched to do, as passed on its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub slot_id: usize,
    pub topic: String,
    pub master_pid: u32,
}

/// Runs `task` for the assigned topic inside a worker process.
///
/// Task failures are logged here and never reach the master. Returns the exit
/// code the process should use.
pub fn run_worker(assignment: &WorkerAssignment, process_name: &str, task: &dyn TaskRunner) -> i32 {
    let WorkerAssignment {
        slot_id,
        topic,
        master_pid,
    } = assignment;

    set_process_name(&worker_display_name(
        *slot_id,
        topic,
        *master_pid,
        process_name,
    ));
    info!(
        "worker id: {slot_id} topic: {topic} pid: {} running",
        std::process::id()
    );

    let code = match task.run(topic) {
        Ok(()) => 0,
        Err(err) => {
            error!("worker id: {slot_id} topic: {topic} failed: {err}");
            1
        }
    };

    info!("worker id: {slot_id} is done!!!");
    code
}
