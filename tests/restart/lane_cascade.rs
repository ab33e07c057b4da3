//! Restart Lane Cascade Tests
//!
//! A system restart requested by one task suspends only the tasks that depend
//! on it through the same lane.

use crate::common::{chain, join_lane, set_status, statuses, RecordingRestartHandler};
use std::sync::Arc;
use steward_core::constants::{change_keys, task_keys};
use steward_core::restart::{RestartInfo, RestartManager, RestartType};
use steward_core::state::{State, StateGuard};
use steward_core::state_machine::TaskStatus;
use TaskStatus::*;

fn manager(state: &State) -> (Arc<RecordingRestartHandler>, RestartManager) {
    let handler = Arc::new(RecordingRestartHandler::default());
    let manager = RestartManager::new(state.clone(), "boot-A", Some(handler.clone())).unwrap();
    (handler, manager)
}

fn waited(st: &StateGuard<'_>, ids: &[String]) -> Vec<Option<TaskStatus>> {
    ids.iter()
        .map(|id| st.task(id).unwrap().waited_status())
        .collect()
}

/// t1 -> t2 -> t3 in lane 1; t4 -> t5 in lane 1 after t3; t6 -> t7 -> t8 in lane 2 after t3
fn two_lane_graph(st: &mut StateGuard<'_>) -> (String, Vec<String>) {
    let chg = st.new_change("refresh", "Refresh \"core\" and \"pc\"");
    let base = chain(st, &chg, "base", 3);
    let same = chain(st, &chg, "same-lane", 2);
    let other = chain(st, &chg, "other-lane", 3);
    st.task_wait_for(&same[0], &base[2]).unwrap();
    st.task_wait_for(&other[0], &base[2]).unwrap();

    let lane1 = st.new_lane();
    let lane2 = st.new_lane();
    join_lane(st, &base, lane1);
    join_lane(st, &same, lane1);
    join_lane(st, &other, lane2);

    let mut ids = base;
    ids.extend(same);
    ids.extend(other);
    (chg, ids)
}

#[test]
fn test_forward_cascade_stays_in_lane() {
    let state = State::in_memory();
    let (handler, manager) = manager(&state);
    let mut st = state.lock();
    let (chg, ids) = two_lane_graph(&mut st);
    set_status(&mut st, &ids[..2], Done);
    set_status(&mut st, &ids[2..3], Doing);

    manager
        .request_restart_for_task(&mut st, &ids[2], "pc", Done, RestartType::System, None)
        .unwrap();

    assert_eq!(
        statuses(&st, &ids),
        vec![Done, Done, Done, Wait, Wait, Do, Do, Do]
    );
    assert_eq!(waited(&st, &ids[3..5]), vec![Some(Do), Some(Do)]);
    for id in &ids[3..5] {
        assert_eq!(
            st.task(id)
                .unwrap()
                .get::<String>(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID)
                .unwrap(),
            "boot-A"
        );
    }
    assert!(!st.task(&ids[5]).unwrap().has(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID));
    assert_eq!(st.change_status(&chg).unwrap(), Do);

    let info: RestartInfo = st.change(&chg).unwrap().get(change_keys::RESTART_INFO).unwrap();
    assert_eq!(info.requesters, vec!["pc".to_string()]);
    assert_eq!(info.restart_type, RestartType::System);
    assert_eq!(
        info.waiters.iter().map(|w| w.task_id.as_str()).collect::<Vec<_>>(),
        vec![ids[3].as_str(), ids[4].as_str()]
    );

    // the other lane still has to run, so no restart yet
    assert!(!manager.pending_for_system_restart(&st, &chg).unwrap());
    set_status(&mut st, &ids[5..], Done);
    assert!(manager.pending_for_system_restart(&st, &chg).unwrap());
    assert!(handler.restart_kinds().is_empty());
}

#[test]
fn test_reverse_cascade_stays_in_lane() {
    let state = State::in_memory();
    let (_handler, manager) = manager(&state);
    let mut st = state.lock();
    let chg = st.new_change("revert", "...");
    let undoing = chain(&mut st, &chg, "revert", 4);
    let unrelated = chain(&mut st, &chg, "other", 2);
    st.task_wait_for(&undoing[3], &unrelated[0]).unwrap();
    let lane1 = st.new_lane();
    let lane2 = st.new_lane();
    join_lane(&mut st, &undoing, lane1);
    join_lane(&mut st, &unrelated, lane2);
    set_status(&mut st, &undoing[..3], Undo);
    set_status(&mut st, &undoing[3..], Undoing);

    manager
        .request_restart_for_task(&mut st, &undoing[3], "core", Undone, RestartType::System, None)
        .unwrap();

    assert_eq!(statuses(&st, &undoing), vec![Wait, Wait, Wait, Undone]);
    assert_eq!(waited(&st, &undoing[..3]), vec![Some(Undo); 3]);
    assert_eq!(statuses(&st, &unrelated), vec![Do, Do]);
}

#[test]
fn test_requester_without_dependents_waits_itself() {
    let state = State::in_memory();
    let (handler, manager) = manager(&state);
    let mut st = state.lock();
    let chg = st.new_change("refresh", "...");
    let ids = chain(&mut st, &chg, "step", 2);
    let lane1 = st.new_lane();
    let lane2 = st.new_lane();
    join_lane(&mut st, &ids[..1], lane1);
    join_lane(&mut st, &ids[1..], lane2);
    set_status(&mut st, &ids[..1], Doing);

    manager
        .request_restart_for_task(&mut st, &ids[0], "core", Done, RestartType::System, None)
        .unwrap();
    assert_eq!(statuses(&st, &ids), vec![Wait, Do]);
    assert_eq!(waited(&st, &ids[..1]), vec![Some(Done)]);

    // the dependent cannot run before its prerequisite is done
    assert!(manager.pending_for_system_restart(&st, &chg).unwrap());
    manager.request_restart_for_change(&mut st, &chg).unwrap();
    assert_eq!(handler.restart_kinds(), vec![RestartType::System]);
    assert!(st
        .change(&chg)
        .unwrap()
        .get::<bool>(change_keys::WAIT_FOR_SYSTEM_RESTART)
        .unwrap());
    assert_eq!(
        st.change(&chg)
            .unwrap()
            .get::<String>(change_keys::SYSTEM_RESTART_FROM_BOOT_ID)
            .unwrap(),
        "boot-A"
    );
}

#[test]
fn test_reboot_releases_partners() {
    let state = State::in_memory();
    let (_handler, manager) = manager(&state);
    let (chg, ids) = {
        let mut st = state.lock();
        let (chg, ids) = two_lane_graph(&mut st);
        set_status(&mut st, &ids[..2], Done);
        set_status(&mut st, &ids[2..3], Doing);
        set_status(&mut st, &ids[5..], Done);
        manager
            .request_restart_for_task(&mut st, &ids[2], "pc", Done, RestartType::System, None)
            .unwrap();
        manager.request_restart_for_change(&mut st, &chg).unwrap();
        (chg, ids)
    };

    manager.replace_boot_id("boot-B");
    manager.start_up().unwrap();

    let st = state.lock();
    assert_eq!(statuses(&st, &ids[3..5]), vec![Do, Do]);
    for id in &ids[3..5] {
        let task = st.task(id).unwrap();
        assert!(!task.has(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID));
        assert!(task.log().last().unwrap().ends_with("System restart completed, continuing"));
    }
    let change = st.change(&chg).unwrap();
    assert!(!change.has(change_keys::RESTART_INFO));
    assert!(!change.has(change_keys::WAIT_FOR_SYSTEM_RESTART));
}
