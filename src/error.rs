use thiserror::Error;

/// Crate-wide error type for state, graph and restart operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StewardError {
    #[error("no state entry for key {0:?}")]
    NoState(String),

    #[error("cannot find change with id {0:?}")]
    ChangeNotFound(String),

    #[error("cannot find task with id {0:?}")]
    TaskNotFound(String),

    #[error("{resource} has {change_kind:?} change in progress (change {change_id})")]
    ChangeConflict {
        resource: String,
        change_kind: String,
        change_id: String,
    },

    #[error("State transition error: {0}")]
    StateTransition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Restart(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StewardError {
    /// True for the lookup failures callers commonly treat as "absent"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoState(_) | Self::ChangeNotFound(_) | Self::TaskNotFound(_)
        )
    }
}

impl From<serde_json::Error> for StewardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StewardError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<crate::state_machine::StateMachineError> for StewardError {
    fn from(err: crate::state_machine::StateMachineError) -> Self {
        Self::StateTransition(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StewardError>;
