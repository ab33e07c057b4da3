#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Steward Core
//!
//! Durable change/task orchestration engine for a package manager's background
//! work, built to survive process restarts and machine reboots mid-operation.
//!
//! ## Overview
//!
//! Work is expressed as a [`models::Change`] made of [`models::Task`]s linked by
//! wait edges. The [`orchestration::TaskRunner`] runs each task's handler once its
//! prerequisites are done, and rolls the change back when a handler fails. Tasks
//! may ask the [`restart::RestartManager`] for a service restart or a reboot; the
//! tasks that depend on them in the same lane stay suspended until the boot id
//! shows the reboot happened.
//!
//! ## Module Organization
//!
//! - [`state`] - Lock-guarded state document with checkpointing
//! - [`models`] - Changes, tasks, task sets and their custom data
//! - [`state_machine`] - Task statuses and the transition table
//! - [`orchestration`] - Scheduler, engine loop and handler outcomes
//! - [`registry`] - Task kind to handler resolution
//! - [`restart`] - Restart requests, lane cascades and boot id reconciliation
//! - [`config`] - Configuration loading and validation
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use steward_core::orchestration::TaskRunner;
//! use steward_core::registry::handler_fn;
//! use steward_core::state::State;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> steward_core::Result<()> {
//! let state = State::in_memory();
//! let runner = TaskRunner::new(state.clone());
//! runner.add_handler("download", handler_fn(|_ctx| async { Ok(()) }), None);
//!
//! {
//!     let mut st = state.lock();
//!     let chg = st.new_change("install", "Install \"hello\"");
//!     let task = st.new_task("download", "Download \"hello\"");
//!     st.add_task(&chg, &task)?;
//! }
//!
//! runner.ensure()?;
//! runner.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod restart;
pub mod state;
pub mod state_machine;

pub use config::{ConfigManager, StewardConfig};
pub use constants::{status_groups, TaskStatus};
pub use error::{Result, StewardError};
pub use models::{Change, Task, TaskSet};
pub use orchestration::{HandlerError, HandlerResult, Orchestrator, TaskContext, TaskRunner};
pub use restart::{RestartHandler, RestartManager, RestartType};
pub use state::State;
