use thiserror::Error;

/// Error types for task status transitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("cannot set task status to wait without a waited status")]
    WaitWithoutWaitedStatus,

    #[error("cannot wait for status {0}")]
    InvalidWaitedStatus(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper for the invalid transition case
pub fn invalid_transition(from: impl Into<String>, event: impl Into<String>) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from: from.into(),
        event: event.into(),
    }
}
