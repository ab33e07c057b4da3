//! Transition Table Tests
//!
//! Checks the whole table: every defined edge and a sample of rejected ones.

use steward_core::state_machine::{determine_target_state, StateMachineError, TaskEvent, TaskStatus};
use TaskStatus::*;

fn target(current: TaskStatus, waited: Option<TaskStatus>, event: TaskEvent) -> Option<(TaskStatus, Option<TaskStatus>)> {
    determine_target_state(current, waited, &event)
        .ok()
        .map(|t| (t.status, t.waited))
}

#[test]
fn test_defined_edges() {
    let cases = [
        (Do, None, TaskEvent::Start, Doing),
        (Undo, None, TaskEvent::Start, Undoing),
        (Doing, None, TaskEvent::Complete, Done),
        (Undoing, None, TaskEvent::Complete, Undone),
        (Abort, None, TaskEvent::Complete, Undo),
        (Doing, None, TaskEvent::fail_with_error("x"), Error),
        (Undoing, None, TaskEvent::fail_with_error("x"), Error),
        (Abort, None, TaskEvent::fail_with_error("x"), Error),
        (Do, None, TaskEvent::Abort, Abort),
        (Doing, None, TaskEvent::Abort, Abort),
        (Done, None, TaskEvent::Abort, Undo),
        (Wait, Some(Done), TaskEvent::Abort, Undo),
        (Wait, Some(Do), TaskEvent::Abort, Abort),
        (Do, None, TaskEvent::Hold, Hold),
        (Abort, None, TaskEvent::Hold, Hold),
        (Wait, Some(Undone), TaskEvent::Release, Undone),
    ];
    for (current, waited, event, expected) in cases {
        let label = format!("{current} --{}-->", event.event_type());
        assert_eq!(target(current, waited, event), Some((expected, None)), "{label}");
    }
}

#[test]
fn test_wait_for_records_waited_status() {
    for current in [Do, Doing, Done, Undo, Undoing, Undone] {
        assert_eq!(
            target(current, None, TaskEvent::WaitFor(Done)),
            Some((Wait, Some(Done)))
        );
    }
    for current in [Error, Hold, Abort, Wait] {
        assert_eq!(target(current, None, TaskEvent::WaitFor(Done)), None);
    }
}

#[test]
fn test_waited_status_must_be_resumable() {
    for waited in [Wait, Abort, Error, Hold] {
        assert_eq!(
            determine_target_state(Doing, None, &TaskEvent::WaitFor(waited)),
            Err(StateMachineError::InvalidWaitedStatus(waited.to_string()))
        );
    }
}

#[test]
fn test_rejected_edges() {
    assert_eq!(target(Done, None, TaskEvent::Start), None);
    assert_eq!(target(Do, None, TaskEvent::Complete), None);
    assert_eq!(target(Undone, None, TaskEvent::Abort), None);
    assert_eq!(target(Error, None, TaskEvent::Abort), None);
    assert_eq!(target(Hold, None, TaskEvent::Start), None);
    assert_eq!(target(Do, None, TaskEvent::Release), None);
    assert_eq!(target(Wait, Some(Undo), TaskEvent::Abort), None);
}
