//! # State Engine
//!
//! Drives an ordered list of managers over the shared state: one `start_up`,
//! then repeated `ensure` passes, then `stop`.

use crate::error::{Result, StewardError};
use crate::orchestration::TaskRunner;
use crate::state::State;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A component taking part in every engine pass
#[async_trait]
pub trait StateManager: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once, before the first ensure pass
    async fn start_up(&self) -> Result<()> {
        Ok(())
    }

    /// Bring the manager's part of the state closer to where it should be
    async fn ensure(&self) -> Result<()>;

    async fn stop(&self) {}
}

#[async_trait]
impl StateManager for TaskRunner {
    fn name(&self) -> &'static str {
        "task-runner"
    }

    async fn ensure(&self) -> Result<()> {
        TaskRunner::ensure(self)
    }

    async fn stop(&self) {
        TaskRunner::stop(self).await;
    }
}

pub struct StateEngine {
    state: State,
    managers: Vec<Arc<dyn StateManager>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl StateEngine {
    pub fn new(state: State) -> Self {
        Self {
            state,
            managers: Vec::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn add_manager(&mut self, manager: Arc<dyn StateManager>) {
        self.managers.push(manager);
    }

    /// Start every manager once; later calls are no-ops
    pub async fn start_up(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for manager in &self.managers {
            debug!(manager = manager.name(), "Starting manager");
            manager.start_up().await?;
        }
        info!(managers = self.managers.len(), "State engine started");
        Ok(())
    }

    /// Run every manager's ensure pass, reporting all failures together
    pub async fn ensure(&self) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(StewardError::Internal(
                "state engine ensure called before start up".to_string(),
            ));
        }
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut errors = Vec::new();
        for manager in &self.managers {
            if let Err(e) = manager.ensure().await {
                warn!(manager = manager.name(), error = %e, "Manager ensure failed");
                errors.push(format!("{}: {e}", manager.name()));
            }
        }
        match errors.len() {
            0 => Ok(()),
            1 => Err(StewardError::Internal(format!("state ensure error: {}", errors[0]))),
            _ => Err(StewardError::Internal(format!(
                "state ensure errors: [{}]",
                errors.join("; ")
            ))),
        }
    }

    /// Stop managers in registration order
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for manager in &self.managers {
            manager.stop().await;
        }
        info!("State engine stopped");
    }
}
