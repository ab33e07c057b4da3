//! # Viable Task Discovery
//!
//! Decides which tasks of a change may be handed to a handler right now.
//!
//! ## Rules
//!
//! - Forward: a `Do` task runs once every task it waits for is `Done`.
//! - Reverse: an `Undo` task runs once every halt task has stopped for good in
//!   the reverse direction (see [`status_groups::UNDO_UNBLOCKING_STATES`]) and
//!   none of them is still executing.
//! - `Doing`/`Undoing` tasks with no live handler are resumed as they are.
//! - A task postponed with an `at_time` in the future is skipped; the earliest
//!   such time is reported so the caller can schedule the next pass.

use crate::constants::status_groups;
use crate::error::Result;
use crate::models::Task;
use crate::orchestration::Direction;
use crate::state::StateGuard;
use crate::state_machine::TaskStatus;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A task that may be launched now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViableTask {
    pub task_id: String,
    pub kind: String,
    pub direction: Direction,
    /// The task was already running when its handler went away
    pub resume: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub viable: Vec<ViableTask>,
    pub next_wakeup: Option<DateTime<Utc>>,
}

/// Every wait-edge target is `Done`
pub fn forward_prerequisites_met(st: &StateGuard<'_>, task: &Task) -> bool {
    task.wait_task_ids().iter().all(|id| {
        st.task(id)
            .map(|t| t.status().satisfies_dependencies())
            .unwrap_or(true)
    })
}

/// Every halt task is done with the reverse direction and not executing
pub fn reverse_prerequisites_met(
    st: &StateGuard<'_>,
    task: &Task,
    running: &HashSet<String>,
) -> bool {
    st.halt_tasks(task.id()).iter().all(|halt| {
        status_groups::UNDO_UNBLOCKING_STATES.contains(&halt.status())
            && !running.contains(halt.id())
    })
}

/// A `Do` or `Undo` task whose prerequisites for its direction are met
pub fn is_runnable(st: &StateGuard<'_>, task: &Task) -> bool {
    match task.status() {
        TaskStatus::Do => forward_prerequisites_met(st, task),
        TaskStatus::Undo => reverse_prerequisites_met(st, task, &HashSet::new()),
        _ => false,
    }
}

/// Find the tasks of a change that may be launched at `now`
pub fn find_viable_tasks(
    st: &StateGuard<'_>,
    change_id: &str,
    running: &HashSet<String>,
    now: DateTime<Utc>,
) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    for task in st.change_tasks(change_id)? {
        if running.contains(task.id()) {
            continue;
        }
        let candidate = match task.status() {
            TaskStatus::Do if forward_prerequisites_met(st, task) => Some((Direction::Do, false)),
            TaskStatus::Doing => Some((Direction::Do, true)),
            TaskStatus::Undo if reverse_prerequisites_met(st, task, running) => {
                Some((Direction::Undo, false))
            }
            TaskStatus::Undoing => Some((Direction::Undo, true)),
            _ => None,
        };
        let Some((direction, resume)) = candidate else {
            continue;
        };

        if let Some(at) = task.at_time() {
            if at > now {
                discovery.next_wakeup = Some(discovery.next_wakeup.map_or(at, |n| n.min(at)));
                continue;
            }
        }

        discovery.viable.push(ViableTask {
            task_id: task.id().to_string(),
            kind: task.kind().to_string(),
            direction,
            resume,
        });
    }

    Ok(discovery)
}
