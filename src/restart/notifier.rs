//! Operator notification about a pending manual reboot on classic hosts.

use crate::config::RestartConfig;
use crate::constants::notifier_env;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("cannot run {path}: {reason}")]
    Spawn { path: String, reason: String },

    #[error("{output}")]
    Failed { output: String },
}

/// Runs the configured notifier executable for a requester
#[derive(Debug, Clone)]
pub struct RebootNotifier {
    path: PathBuf,
    phase: String,
    prefix: String,
}

impl RebootNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            phase: notifier_env::DEFAULT_PHASE.to_string(),
            prefix: String::new(),
        }
    }

    /// Build from configuration; `None` when no notifier is configured
    pub fn from_config(config: &RestartConfig) -> Option<Self> {
        config.notifier_path.as_ref().map(|path| Self {
            path: path.clone(),
            phase: config.notifier_phase.clone(),
            prefix: config.notifier_requester_prefix.clone(),
        })
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    pub fn with_requester_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Tell the operator that `requester` needs a reboot
    ///
    /// A notifier that is not installed is skipped silently.
    pub fn notify(&self, requester: &str) -> Result<(), NotifierError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Reboot notifier not installed, skipping");
            return Ok(());
        }
        let package = format!("{}{}", self.prefix, requester);
        let output = Command::new(&self.path)
            .arg(&package)
            .env(notifier_env::PACKAGE, &package)
            .env(notifier_env::PHASE, &self.phase)
            .output()
            .map_err(|e| NotifierError::Spawn {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(NotifierError::Failed {
                output: combined.trim().to_string(),
            });
        }
        Ok(())
    }
}
