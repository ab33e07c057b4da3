//! Configuration Loader
//!
//! Layers an optional configuration file and `STEWARD__*` environment overrides
//! with the `config` crate, then validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::{RestartConfig, StewardConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const ENV_PREFIX: &str = "STEWARD";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: StewardConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load defaults plus environment overrides only
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layers(None, None)
    }

    /// Load a configuration file plus environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layers(Some(path.as_ref()), None)
    }

    /// Load with an explicit environment map instead of the process environment
    ///
    /// This is useful for testing without modifying global environment variables
    pub fn load_with_env(
        path: Option<&Path>,
        env: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layers(path, Some(env))
    }

    /// Wrap an already built configuration after validating it
    pub fn from_config(config: StewardConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source: None,
        }))
    }

    fn load_layers(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::FileNotFound(path.display().to_string()));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: StewardConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            state_path = %config.state.path.display(),
            ensure_interval_ms = config.runner.ensure_interval_ms,
            classic = config.restart.classic,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source: path.map(Path::to_path_buf),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &StewardConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Resolve the current boot identifier from configuration
pub fn read_boot_id(restart: &RestartConfig) -> ConfigResult<String> {
    if let Some(boot_id) = &restart.boot_id {
        return Ok(boot_id.clone());
    }
    let path = &restart.boot_id_path;
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigurationError::BootId {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let boot_id = raw.trim();
    if boot_id.is_empty() {
        return Err(ConfigurationError::BootId {
            path: path.display().to_string(),
            reason: "empty boot id".to_string(),
        });
    }
    Ok(boot_id.to_string())
}
