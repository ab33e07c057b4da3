use steward_core::state::StateGuard;
use steward_core::state_machine::TaskStatus;

/// Create `count` tasks of `kind` chained by wait edges, each waiting for the previous one
pub fn chain(st: &mut StateGuard<'_>, change_id: &str, kind: &str, count: usize) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(count);
    for i in 0..count {
        let id = st.new_task(kind, &format!("{kind} #{}", i + 1));
        if let Some(previous) = ids.last() {
            st.task_wait_for(&id, previous).unwrap();
        }
        st.add_task(change_id, &id).unwrap();
        ids.push(id);
    }
    ids
}

pub fn join_lane(st: &mut StateGuard<'_>, task_ids: &[String], lane: u32) {
    for id in task_ids {
        st.task_mut(id).unwrap().join_lane(lane);
    }
}

pub fn set_status(st: &mut StateGuard<'_>, task_ids: &[String], status: TaskStatus) {
    for id in task_ids {
        st.task_mut(id).unwrap().set_status(status).unwrap();
    }
}

pub fn statuses(st: &StateGuard<'_>, task_ids: &[String]) -> Vec<TaskStatus> {
    task_ids
        .iter()
        .map(|id| st.task(id).unwrap().status())
        .collect()
}
