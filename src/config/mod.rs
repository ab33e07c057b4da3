//! # Steward Configuration System
//!
//! Typed configuration for the state store, the task runner, the restart
//! coordinator and logging.
//!
//! ## Architecture
//!
//! - **Layered sources**: an optional TOML/YAML/JSON file, then `STEWARD__*`
//!   environment overrides (`STEWARD__RUNNER__ENSURE_INTERVAL_MS=500`)
//! - **Defaults everywhere**: every field has a default, an empty file is valid
//! - **Explicit validation**: values are checked once after loading
//!
//! ## Usage
//!
//! ```rust,no_run
//! use steward_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("/etc/steward/steward.toml")?;
//! let interval = manager.config().runner.ensure_interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{notifier_env, DEFAULT_BOOT_ID_PATH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardConfig {
    pub state: StateConfig,
    pub runner: RunnerConfig,
    pub restart: RestartConfig,
    pub logging: LoggingConfig,
}

impl StewardConfig {
    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.state.path.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "state.path",
                "must not be empty",
            ));
        }
        if self.runner.ensure_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "runner.ensure_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.restart.boot_id.as_deref() == Some("") {
            return Err(ConfigurationError::invalid_value(
                "restart.boot_id",
                "must not be empty when set",
            ));
        }
        if self.restart.notifier_phase.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "restart.notifier_phase",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Where the state document lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/steward/state.json"),
        }
    }
}

/// Task runner and engine loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interval between ensure passes when nothing asks for an earlier one
    pub ensure_interval_ms: u64,
    /// Delay applied to a retry that does not name one
    pub default_retry_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ensure_interval_ms: 5 * 60 * 1000,
            default_retry_delay_ms: 5000,
        }
    }
}

impl RunnerConfig {
    pub fn ensure_interval(&self) -> Duration {
        Duration::from_millis(self.ensure_interval_ms)
    }

    pub fn default_retry_delay(&self) -> Duration {
        Duration::from_millis(self.default_retry_delay_ms)
    }
}

/// Restart coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Host defers automatic reboots (desktop-class system)
    pub classic: bool,
    /// Explicit boot identifier; read from `boot_id_path` when unset
    pub boot_id: Option<String>,
    pub boot_id_path: PathBuf,
    /// Executable told about pending reboots on classic hosts
    pub notifier_path: Option<PathBuf>,
    pub notifier_phase: String,
    /// Prefix put in front of the requester name passed to the notifier
    pub notifier_requester_prefix: String,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            classic: false,
            boot_id: None,
            boot_id_path: PathBuf::from(DEFAULT_BOOT_ID_PATH),
            notifier_path: None,
            notifier_phase: notifier_env::DEFAULT_PHASE.to_string(),
            notifier_requester_prefix: "snap:".to_string(),
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; derived from the environment when unset
    pub level: Option<String>,
    pub json: bool,
}
