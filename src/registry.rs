//! In-memory map from live worker pid to the worker occupying that slot.
use std::collections::HashMap;

use crate::worker::Worker;

/// Live workers keyed by pid. Only the master mutates it.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<u32, Worker>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `worker` under `pid`, returning any worker previously stored there.
    pub fn insert(&mut self, pid: u32, worker: Worker) -> Option<Worker> {
        self.workers.insert(pid, worker)
    }

    pub fn remove(&mut self, pid: u32) -> Option<Worker> {
        self.workers.remove(&pid)
    }

    pub fn get(&self, pid: u32) -> Option<&Worker> {
        self.workers.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.workers.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Returns registered pids in ascending order.
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.workers.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &Worker)> {
        self.workers.iter()
    }
}
