//! Configuration loading and typed config structures for botengine.
//!
//! The canonical configuration lives in `botengine-config.yaml` at the
//! project root. Every field has a default, so the file is optional and a
//! partial file only overrides what it names.
//!
//! Environment variables override the agent section:
//! - `BOTENGINE_SCRIPT` overrides `agents.script_path`
//! - `BOTENGINE_AGENTS` overrides `agents.count`

use std::path::{Path, PathBuf};
use std::time::Duration;

use botengine_agents::OverflowPolicy;
use serde::Deserialize;

use crate::control::MIN_TICK_INTERVAL_MS;
use crate::registry::HandoffPolicy;

/// Environment variable overriding `agents.script_path`.
pub const ENV_SCRIPT: &str = "BOTENGINE_SCRIPT";

/// Environment variable overriding `agents.count`.
pub const ENV_AGENTS: &str = "BOTENGINE_AGENTS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Tick scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Agent population settings.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file, apply environment overrides and
    /// validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment overrides
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.agents.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (
                self.scheduler.tick_interval_ms < MIN_TICK_INTERVAL_MS,
                "scheduler.tick_interval_ms must be at least 10",
            ),
            (
                self.scheduler.action_queue_capacity == 0,
                "scheduler.action_queue_capacity must be > 0",
            ),
            (self.scheduler.motor_delay_ticks == 0, "scheduler.motor_delay_ticks must be > 0"),
            (self.scheduler.handoff_timeout_ms == 0, "scheduler.handoff_timeout_ms must be > 0"),
            (self.scheduler.handoff_attempts == 0, "scheduler.handoff_attempts must be > 0"),
            (self.agents.inbound_capacity == 0, "agents.inbound_capacity must be > 0"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(ConfigError::Invalid {
                reason: (*reason).to_owned(),
            }),
            None => Ok(()),
        }
    }
}

/// Tick scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Capacity of the shared action queue.
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,

    /// What a producer does when the action queue is full.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Ticks between a processed move and its `motor_ready` reset.
    #[serde(default = "default_motor_delay_ticks")]
    pub motor_delay_ticks: u64,

    /// Time allowed for one register hand-off attempt.
    #[serde(default = "default_handoff_timeout_ms")]
    pub handoff_timeout_ms: u64,

    /// Hand-off attempts before a listener is declared unresponsive.
    #[serde(default = "default_handoff_attempts")]
    pub handoff_attempts: u32,

    /// Stop after this many ticks (0 = unbounded).
    #[serde(default)]
    pub max_ticks: u64,
}

impl SchedulerConfig {
    /// Tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Hand-off parameters for effect delivery.
    pub const fn handoff(&self) -> HandoffPolicy {
        HandoffPolicy {
            timeout: Duration::from_millis(self.handoff_timeout_ms),
            attempts: self.handoff_attempts,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            action_queue_capacity: default_action_queue_capacity(),
            overflow_policy: OverflowPolicy::default(),
            motor_delay_ticks: default_motor_delay_ticks(),
            handoff_timeout_ms: default_handoff_timeout_ms(),
            handoff_attempts: default_handoff_attempts(),
            max_ticks: 0,
        }
    }
}

/// Agent population configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentsConfig {
    /// Number of agents to spawn at startup.
    #[serde(default = "default_agent_count")]
    pub count: u32,

    /// Script file run by every agent; the built-in walker when unset.
    #[serde(default)]
    pub script_path: Option<PathBuf>,

    /// Capacity of each agent's inbound register-change path.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Interpreter operation limit per agent (0 = unlimited).
    #[serde(default)]
    pub max_operations: u64,
}

impl AgentsConfig {
    /// Apply `BOTENGINE_SCRIPT` and `BOTENGINE_AGENTS` from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `BOTENGINE_AGENTS` is not a
    /// number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the agent count is not a number.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup(ENV_SCRIPT) {
            self.script_path = Some(PathBuf::from(path));
        }
        if let Some(count) = lookup(ENV_AGENTS) {
            self.count = count.trim().parse().map_err(|err| ConfigError::Invalid {
                reason: format!("{ENV_AGENTS}={count:?} is not an agent count: {err}"),
            })?;
        }
        Ok(())
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            count: default_agent_count(),
            script_path: None,
            inbound_capacity: default_inbound_capacity(),
            max_operations: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    500
}

const fn default_action_queue_capacity() -> usize {
    8
}

const fn default_motor_delay_ticks() -> u64 {
    1
}

const fn default_handoff_timeout_ms() -> u64 {
    20
}

const fn default_handoff_attempts() -> u32 {
    3
}

const fn default_agent_count() -> u32 {
    2
}

const fn default_inbound_capacity() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_owned()
}
