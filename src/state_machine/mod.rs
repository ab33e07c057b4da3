// Task status state machine
//
// Statuses, the events the task runner applies, and the pure transition table
// both directions of execution go through.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::{determine_target_state, Transition};
