use crate::state::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Direction a handler runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Do,
    Undo,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do => write!(f, "do"),
            Self::Undo => write!(f, "undo"),
        }
    }
}

/// Everything a handler gets for one invocation
///
/// Handlers lock the state through [`TaskContext::state`] only around the
/// critical sections that touch shared data, and should return promptly with a
/// retry once [`TaskContext::stop_token`] is cancelled.
#[derive(Debug, Clone)]
pub struct TaskContext {
    state: State,
    task_id: String,
    change_id: Option<String>,
    kind: String,
    direction: Direction,
    stop: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(
        state: State,
        task_id: String,
        change_id: Option<String>,
        kind: String,
        direction: Direction,
        stop: CancellationToken,
    ) -> Self {
        Self {
            state,
            task_id,
            change_id,
            kind,
            direction,
            stop,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn change_id(&self) -> Option<&str> {
        self.change_id.as_deref()
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Cancelled when the runner stops the task
    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }
}
