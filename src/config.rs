//! Configuration management for jobsd.
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{
        DEFAULT_CONFIG_FILE, DEFAULT_LOG_DIR, DEFAULT_PROCESS_NAME, DEFAULT_SHUTDOWN_GRACE,
        PID_FILE_NAME,
    },
    error::SupervisorError,
    topics::{Topic, resolve_slots},
};

/// Represents the structure of the configuration file.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Directory holding `master.pid`. Defaults to the app root.
    pub pid_path: Option<String>,
    /// Suffix appended to process display names.
    pub process_name: Option<String>,
    /// Directory holding `master.log` and `worker.log`.
    pub log_path: Option<String>,
    /// Pause between the shutdown message and process exit (e.g. "1s").
    pub shutdown_grace: Option<String>,
    /// Default task command; `{topic}` and `{slot}` are substituted.
    pub command: Option<String>,
    /// Extra environment passed to task commands.
    pub env: Option<HashMap<String, String>>,
    /// Topics to consume and how many workers each gets.
    #[serde(default)]
    pub topics: Vec<Topic>,
    /// Root directory from which relative paths are resolved.
    #[serde(skip)]
    pub project_dir: Option<String>,
}

impl Config {
    /// Returns the app root, falling back to the current directory.
    pub fn project_root(&self) -> PathBuf {
        self.project_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns the command template for `topic`, preferring the topic's own command.
    pub fn command_for(&self, topic: &str) -> Option<&str> {
        self.topics
            .iter()
            .find(|candidate| candidate.name.as_deref() == Some(topic))
            .and_then(|candidate| candidate.command.as_deref())
            .or(self.command.as_deref())
    }

    /// Expands `${VAR}`/`$VAR` references from the loading environment.
    ///
    /// Command templates are left verbatim: `$JOBSD_TOPIC` and the `env:` map
    /// only exist in the task's shell, which expands them per worker.
    pub fn expand_env(&mut self) -> Result<(), SupervisorError> {
        for field in [
            &mut self.pid_path,
            &mut self.process_name,
            &mut self.log_path,
            &mut self.shutdown_grace,
        ]
        .into_iter()
        .flatten()
        {
            *field = expand_env_vars(field)?;
        }

        if let Some(env) = self.env.as_mut() {
            for value in env.values_mut() {
                *value = expand_env_vars(value)?;
            }
        }

        for topic in &mut self.topics {
            if let Some(name) = topic.name.as_mut() {
                *name = expand_env_vars(name)?;
            }
        }

        Ok(())
    }

    /// Rejects configurations whose workers could never run anything.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        for slot in resolve_slots(&self.topics) {
            if self.command_for(&slot.topic).is_none() {
                return Err(SupervisorError::InvalidConfig(format!(
                    "topic '{}' has no command and no default command is set",
                    slot.topic
                )));
            }
        }

        if let Some(raw) = &self.shutdown_grace {
            parse_duration(raw)?;
        }

        Ok(())
    }
}

/// Runtime settings resolved from a [`Config`] into absolute paths.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Configuration file the settings came from.
    pub config_path: PathBuf,
    /// Root directory for relative paths and task working directory.
    pub project_dir: PathBuf,
    /// Full path of the master PID file.
    pub pid_file: PathBuf,
    /// Suffix appended to process display names.
    pub process_name: String,
    /// Directory receiving log files.
    pub log_dir: PathBuf,
    /// Pause before the master exits.
    pub shutdown_grace: Duration,
}

impl Settings {
    /// Resolves settings for `config`, which was loaded from `config_path`.
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self, SupervisorError> {
        let project_dir = absolute(&config.project_root());

        let pid_dir = config
            .pid_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(|path| resolve_against(&project_dir, path))
            .unwrap_or_else(|| project_dir.clone());

        let log_dir = config
            .log_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(|path| resolve_against(&project_dir, path))
            .unwrap_or_else(|| project_dir.join(DEFAULT_LOG_DIR));

        let process_name = config
            .process_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_PROCESS_NAME.to_string());

        let shutdown_grace = match &config.shutdown_grace {
            Some(raw) => parse_duration(raw)?,
            None => DEFAULT_SHUTDOWN_GRACE,
        };

        Ok(Self {
            config_path: absolute(config_path),
            project_dir,
            pid_file: pid_dir.join(PID_FILE_NAME),
            process_name,
            log_dir,
            shutdown_grace,
        })
    }
}

fn resolve_against(base: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    joined.canonicalize().unwrap_or(joined)
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, SupervisorError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(SupervisorError::InvalidConfig(
            "Duration value cannot be empty".into(),
        ));
    }

    let invalid = || SupervisorError::InvalidConfig(format!("Invalid duration value: '{raw}'"));

    if let Some(millis) = value.strip_suffix("ms") {
        let amount: u64 = millis.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(amount));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// Expands environment variables within a string.
fn expand_env_vars(input: &str) -> Result<String, SupervisorError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
        .map_err(|err| SupervisorError::InvalidConfig(err.to_string()))?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(SupervisorError::MissingEnvVar(var_name)),
        None => Ok(result.to_string()),
    }
}

/// Resolves the config path, falling back to `jobsd.yaml` in the current directory.
pub fn config_path(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Loads and parses the configuration file, expanding environment variables
/// outside command templates.
pub fn load_config(config_path: Option<&str>) -> Result<Config, SupervisorError> {
    let config_path = self::config_path(config_path);

    let content =
        fs::read_to_string(&config_path).map_err(|source| SupervisorError::ConfigReadError {
            path: config_path.clone(),
            source,
        })?;

    let mut config: Config = serde_yaml::from_str(&content)?;
    config.expand_env()?;

    let base_path = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    config.project_dir = Some(base_path.to_string_lossy().to_string());

    config.validate()?;
    Ok(config)
}

/// Loads the configuration and resolves runtime settings in one step.
pub fn load_settings(config_path: Option<&str>) -> Result<(Config, Settings), SupervisorError> {
    let path = self::config_path(config_path);
    let config = load_config(Some(path.to_string_lossy().as_ref()))?;
    let settings = Settings::from_config(&config, &path)?;
    Ok((config, settings))
}
