//! Task collaborators executed inside worker processes.
use std::{
    collections::HashMap,
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::Command,
};

use tracing::debug;

use crate::{
    config::Config,
    constants::{
        DEFAULT_SHELL, MASTER_PID_ENV, SHELL_COMMAND_FLAG, SLOT_ENV, SLOT_PLACEHOLDER,
        TOPIC_ENV, TOPIC_PLACEHOLDER,
    },
    error::TaskError,
    worker::WorkerAssignment,
};

/// Consumes one topic. Called once per worker process.
pub trait TaskRunner {
    fn run(&self, topic: &str) -> Result<(), TaskError>;
}

impl<F> TaskRunner for F
where
    F: Fn(&str) -> Result<(), TaskError>,
{
    fn run(&self, topic: &str) -> Result<(), TaskError> {
        self(topic)
    }
}

/// Runs a configured shell command for the topic and waits for it to finish.
#[derive(Debug, Clone)]
pub struct CommandTask {
    template: String,
    working_dir: PathBuf,
    env: HashMap<String, String>,
    slot_id: usize,
    master_pid: u32,
}

impl CommandTask {
    /// Builds the task for the worker described by `assignment`.
    pub fn from_config(config: &Config, assignment: &WorkerAssignment) -> Result<Self, TaskError> {
        let template = config
            .command_for(&assignment.topic)
            .ok_or_else(|| TaskError::MissingCommand(assignment.topic.clone()))?;

        Ok(Self {
            template: template.to_string(),
            working_dir: config.project_root(),
            env: config.env.clone().unwrap_or_default(),
            slot_id: assignment.slot_id,
            master_pid: assignment.master_pid,
        })
    }

    /// Substitutes the topic and slot into the command template.
    pub fn render(&self, topic: &str) -> String {
        self.template
            .replace(TOPIC_PLACEHOLDER, topic)
            .replace(SLOT_PLACEHOLDER, &self.slot_id.to_string())
    }
}

impl TaskRunner for CommandTask {
    fn run(&self, topic: &str) -> Result<(), TaskError> {
        let command = self.render(topic);
        debug!("Running task command for '{topic}': `{command}`");

        let status = Command::new(DEFAULT_SHELL)
            .arg(SHELL_COMMAND_FLAG)
            .arg(&command)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .env(TOPIC_ENV, topic)
            .env(SLOT_ENV, self.slot_id.to_string())
            .env(MASTER_PID_ENV, self.master_pid.to_string())
            .status()?;

        if status.success() {
            return Ok(());
        }

        match (status.code(), status.signal()) {
            (Some(code), _) => Err(TaskError::NonZeroExit {
                topic: topic.to_string(),
                code,
            }),
            (None, Some(signal)) => Err(TaskError::Signaled {
                topic: topic.to_string(),
                signal,
            }),
            (None, None) => Err(TaskError::Failed(format!(
                "task for topic '{topic}' ended with {status}"
            ))),
        }
    }
}
