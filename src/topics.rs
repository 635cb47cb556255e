//! Topic enumeration and worker slot resolution.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SupervisorError;

/// A named unit of work and the number of concurrent workers it wants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic name handed to the task.
    pub name: Option<String>,
    /// Desired number of concurrent workers.
    #[serde(alias = "workerNum")]
    pub worker_num: Option<i64>,
    /// Command overriding the default task command for this topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Topic {
    /// Convenience constructor for a topic with a worker count.
    pub fn new(name: impl Into<String>, worker_num: i64) -> Self {
        Self {
            name: Some(name.into()),
            worker_num: Some(worker_num),
            command: None,
        }
    }
}

/// One worker position to launch: its slot id and the topic it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSlot {
    /// Position across all topics, starting at 0.
    pub slot_id: usize,
    /// Topic consumed by this slot.
    pub topic: String,
}

/// Supplies the topics the master should staff. Queried once at start.
pub trait TopicSource {
    fn topics(&self) -> Result<Vec<Topic>, SupervisorError>;
}

/// Topic source backed by a fixed list, typically read from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticTopics(Vec<Topic>);

impl StaticTopics {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self(topics)
    }
}

impl TopicSource for StaticTopics {
    fn topics(&self) -> Result<Vec<Topic>, SupervisorError> {
        Ok(self.0.clone())
    }
}

impl<F> TopicSource for F
where
    F: Fn() -> Result<Vec<Topic>, SupervisorError>,
{
    fn topics(&self) -> Result<Vec<Topic>, SupervisorError> {
        self()
    }
}

/// Flattens topics into worker slots.
///
/// Slot ids are assigned across all topics in iteration order. Topics missing a
/// name or a worker count are skipped; negative counts produce no slots.
pub fn resolve_slots(topics: &[Topic]) -> Vec<WorkerSlot> {
    let mut slots = Vec::new();

    for topic in topics {
        let (Some(name), Some(worker_num)) = (&topic.name, topic.worker_num) else {
            debug!("Skipping topic without name or worker count: {topic:?}");
            continue;
        };

        for _ in 0..worker_num.max(0) {
            slots.push(WorkerSlot {
                slot_id: slots.len(),
                topic: name.clone(),
            });
        }
    }

    slots
}
