//! # Orchestration Engine
//!
//! Scheduling and execution of the task graph.
//!
//! ## Core Components
//!
//! - **TaskRunner**: launches task handlers once their prerequisites are met and
//!   applies their outcomes
//! - **ViableTaskDiscovery**: decides which tasks of a change may start now
//! - **StateEngine**: runs the start up / ensure / stop cycle over every
//!   [`StateManager`]
//! - **Orchestrator**: wires configuration, state, runner and restart
//!   coordinator into one loop
//! - **ChangeConflict**: rejects new changes touching resources an unready change
//!   already operates on

pub mod change_conflict;
pub mod engine;
pub mod errors;
pub mod orchestrator;
pub mod task_context;
pub mod task_runner;
pub mod viable_task_discovery;

pub use change_conflict::check_change_conflict;
pub use engine::{StateEngine, StateManager};
pub use errors::{HandlerError, HandlerResult};
pub use orchestrator::Orchestrator;
pub use task_context::{Direction, TaskContext};
pub use task_runner::{BlockedFn, TaskRunner};
pub use viable_task_discovery::{find_viable_tasks, is_runnable, Discovery, ViableTask};
