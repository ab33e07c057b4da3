use crate::constants::status_groups;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a task in either the forward ("do") or reverse ("undo") direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to run forward
    Do,
    /// Do handler is executing
    Doing,
    /// Ran forward successfully
    Done,
    /// Do handler was asked to stop because the change is rolling back
    Abort,
    /// Waiting to run in reverse
    Undo,
    /// Undo handler is executing
    Undoing,
    /// Rolled back successfully
    Undone,
    /// Handler failed
    Error,
    /// Will not run (skipped, or paused externally)
    Hold,
    /// Paused until an external condition clears; carries a waited status
    Wait,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 10] = [
        Self::Do,
        Self::Doing,
        Self::Done,
        Self::Abort,
        Self::Undo,
        Self::Undoing,
        Self::Undone,
        Self::Error,
        Self::Hold,
        Self::Wait,
    ];

    /// Check if this status means the task will not run anymore
    pub fn is_ready(&self) -> bool {
        status_groups::READY_STATES.contains(self)
    }

    /// Check if this status satisfies a wait edge for forward scheduling
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if a handler is (or was) executing in this status
    pub fn is_active(&self) -> bool {
        status_groups::RUNNING_STATES.contains(self)
    }

    /// Statuses on the reverse path
    pub fn is_reverse(&self) -> bool {
        matches!(self, Self::Undo | Self::Undoing | Self::Undone)
    }

    /// Check if this status may be recorded as the waited status of a `Wait`
    pub fn is_valid_waited(&self) -> bool {
        !matches!(self, Self::Wait | Self::Abort | Self::Error | Self::Hold)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do => write!(f, "do"),
            Self::Doing => write!(f, "doing"),
            Self::Done => write!(f, "done"),
            Self::Abort => write!(f, "abort"),
            Self::Undo => write!(f, "undo"),
            Self::Undoing => write!(f, "undoing"),
            Self::Undone => write!(f, "undone"),
            Self::Error => write!(f, "error"),
            Self::Hold => write!(f, "hold"),
            Self::Wait => write!(f, "wait"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "do" => Ok(Self::Do),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            "abort" => Ok(Self::Abort),
            "undo" => Ok(Self::Undo),
            "undoing" => Ok(Self::Undoing),
            "undone" => Ok(Self::Undone),
            "error" => Ok(Self::Error),
            "hold" => Ok(Self::Hold),
            "wait" => Ok(Self::Wait),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Default status for new tasks
impl Default for TaskStatus {
    fn default() -> Self {
        Self::Do
    }
}
