//! # Orchestrator
//!
//! Top-level wiring: configuration, the file-backed state, the task runner, the
//! restart coordinator and the engine loop driving them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use steward_core::config::ConfigManager;
//! use steward_core::orchestration::Orchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> steward_core::error::Result<()> {
//! let config = ConfigManager::load_from_file("/etc/steward/steward.toml")?;
//! let orchestrator = Orchestrator::new(config, None)?;
//! orchestrator.runner().add_handler(
//!     "download",
//!     steward_core::registry::handler_fn(|_ctx| async { Ok(()) }),
//!     None,
//! );
//!
//! let shutdown = CancellationToken::new();
//! orchestrator.run(shutdown.clone()).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{loader::read_boot_id, ConfigManager};
use crate::error::{Result, StewardError};
use crate::logging::{init_structured_logging_with, log_error};
use crate::orchestration::{StateEngine, TaskRunner};
use crate::restart::{RebootNotifier, RestartHandler, RestartManager};
use crate::state::{load_state, EnsureSignal, FileBackend, State};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Orchestrator {
    config: Arc<ConfigManager>,
    state: State,
    signal: Arc<EnsureSignal>,
    runner: TaskRunner,
    restart: Arc<RestartManager>,
    engine: StateEngine,
}

impl Orchestrator {
    /// Load the state and build every component from configuration
    pub fn new(
        config: Arc<ConfigManager>,
        restart_handler: Option<Arc<dyn RestartHandler>>,
    ) -> Result<Self> {
        let cfg = config.config();
        init_structured_logging_with(&cfg.logging);

        let backend = Arc::new(FileBackend::new(&cfg.state.path));
        let signal = backend.signal();
        let state = load_state(&cfg.state.path, backend)?;
        let boot_id = read_boot_id(&cfg.restart)?;

        let runner = TaskRunner::with_config(state.clone(), &cfg.runner);
        let restart = Arc::new(
            RestartManager::new(state.clone(), boot_id, restart_handler)?
                .with_classic(cfg.restart.classic)
                .with_notifier(RebootNotifier::from_config(&cfg.restart)),
        );

        let mut engine = StateEngine::new(state.clone());
        engine.add_manager(Arc::new(runner.clone()));
        engine.add_manager(restart.clone());

        info!(
            state_path = %cfg.state.path.display(),
            boot_id = %restart.boot_id(),
            classic = cfg.restart.classic,
            "Orchestrator initialized"
        );

        Ok(Self {
            config,
            state,
            signal,
            runner,
            restart,
            engine,
        })
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn restart(&self) -> &Arc<RestartManager> {
        &self.restart
    }

    /// Start every manager, reconciling restarts from the previous boot
    pub async fn start_up(&self) -> Result<()> {
        self.engine.start_up().await
    }

    /// Run ensure passes until `shutdown` is cancelled
    ///
    /// A pass runs every configured interval, or earlier when a deadline was
    /// requested through the state.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.start_up().await?;
        let interval = self.config.config().runner.ensure_interval();

        loop {
            if let Err(e) = self.engine.ensure().await {
                log_error("orchestrator", "ensure", &e.to_string(), None);
            }

            let next_tick = Instant::now() + interval;
            let wake_at = self
                .signal
                .deadline()
                .map_or(next_tick, |deadline| deadline.min(next_tick));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.signal.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
            self.signal.clear_elapsed();
        }

        self.shutdown().await;
        Ok(())
    }

    /// Ensure and wait until no handler runs and nothing more can be launched
    pub async fn settle(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.settle_inner())
            .await
            .map_err(|_| StewardError::Internal(format!("orchestrator did not settle within {timeout:?}")))?
    }

    async fn settle_inner(&self) -> Result<()> {
        loop {
            self.engine.ensure().await?;
            if self.runner.running_count() > 0 {
                self.runner.wait().await;
                continue;
            }
            self.signal.clear_elapsed();
            match self.signal.deadline() {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    self.signal.clear_elapsed();
                }
                None => return Ok(()),
            }
        }
    }

    /// Stop the managers and flush any checkpoint that previously failed
    pub async fn shutdown(&self) {
        self.engine.stop().await;
        let st = self.state.lock();
        if st.is_modified() {
            debug!("Retrying pending state checkpoint");
        }
        drop(st);
        info!("Orchestrator stopped");
    }
}
