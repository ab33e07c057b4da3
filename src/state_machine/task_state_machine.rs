use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};

/// Resulting status of a transition, with the waited status when entering `Wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: TaskStatus,
    pub waited: Option<TaskStatus>,
}

impl Transition {
    fn to(status: TaskStatus) -> Self {
        Self {
            status,
            waited: None,
        }
    }
}

/// Determine the status a task moves to when `event` is applied
///
/// `waited` is the waited status recorded on a task currently in `Wait`.
/// Events that are not defined for `current` yield `InvalidTransition`.
pub fn determine_target_state(
    current: TaskStatus,
    waited: Option<TaskStatus>,
    event: &TaskEvent,
) -> StateMachineResult<Transition> {
    use TaskStatus::*;

    let target = match (current, event) {
        // Start transitions
        (Do, TaskEvent::Start) => Transition::to(Doing),
        (Undo, TaskEvent::Start) => Transition::to(Undoing),

        // Complete transitions
        (Doing, TaskEvent::Complete) => Transition::to(Done),
        (Undoing, TaskEvent::Complete) => Transition::to(Undone),
        // an aborted do handler that finished anyway has work to roll back
        (Abort, TaskEvent::Complete) => Transition::to(Undo),

        // Failure transitions
        (Doing | Undoing | Abort, TaskEvent::Fail(_)) => Transition::to(Error),

        // Reverse cascade
        (Do | Doing, TaskEvent::Abort) => Transition::to(Abort),
        (Done, TaskEvent::Abort) => Transition::to(Undo),
        (Wait, TaskEvent::Abort) => match waited {
            Some(Done) => Transition::to(Undo),
            Some(Do) => Transition::to(Abort),
            Some(other) => return Err(invalid_transition(format!("wait({other})"), "abort")),
            None => return Err(StateMachineError::WaitWithoutWaitedStatus),
        },

        (Do | Abort, TaskEvent::Hold) => Transition::to(Hold),

        (Do | Doing | Done | Undo | Undoing | Undone, TaskEvent::WaitFor(status)) => {
            if !status.is_valid_waited() {
                return Err(StateMachineError::InvalidWaitedStatus(status.to_string()));
            }
            Transition {
                status: Wait,
                waited: Some(*status),
            }
        }

        (Wait, TaskEvent::Release) => match waited {
            Some(status) => Transition::to(status),
            None => return Err(StateMachineError::WaitWithoutWaitedStatus),
        },

        (from, event) => return Err(invalid_transition(from.to_string(), event.event_type())),
    };

    Ok(target)
}
