use super::states::TaskStatus;
use serde::{Deserialize, Serialize};

/// Events that can trigger task status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// A handler is launched for the task
    Start,
    /// The handler returned successfully
    Complete,
    /// The handler failed with an error message
    Fail(String),
    /// The change is rolling back
    Abort,
    /// The task will not run
    Hold,
    /// Suspend the task, adopting the given status once released
    WaitFor(TaskStatus),
    /// Clear a wait, adopting the waited status
    Release,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Abort => "abort",
            Self::Hold => "hold",
            Self::WaitFor(_) => "wait_for",
            Self::Release => "release",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
