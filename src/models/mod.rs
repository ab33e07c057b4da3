pub mod change;
pub mod custom_data;
pub mod task;
pub mod task_set;

// Re-export core models for easy access
pub use change::Change;
pub use custom_data::CustomData;
pub use task::{Task, DEFAULT_LANE};
pub use task_set::TaskSet;
