use steward_core::models::TaskSet;
use steward_core::state::State;

#[test]
fn test_task_sets_wire_a_change() {
    let state = State::in_memory();
    let mut st = state.lock();
    let chg = st.new_change("install", "Install \"hello\"");

    let prepare = TaskSet::new([st.new_task("download", "..."), st.new_task("validate", "...")]);
    let mut install = TaskSet::new([st.new_task("mount", "...")]);
    install.add_task(st.new_task("link", "..."));
    install.add_task(install.task_ids()[0].clone());
    assert_eq!(install.task_ids().len(), 2);

    install.wait_all(&mut st, &prepare).unwrap();
    let lane = st.new_lane();
    let mut all = prepare.clone();
    all.add_all(&install);
    all.join_lane(&mut st, lane).unwrap();
    all.add_to_change(&mut st, &chg).unwrap();

    assert_eq!(st.change(&chg).unwrap().task_ids(), all.task_ids());
    for id in install.task_ids() {
        assert_eq!(st.task(id).unwrap().wait_task_ids(), prepare.task_ids());
        assert_eq!(st.task(id).unwrap().lanes(), vec![lane]);
    }
    assert_eq!(st.halt_task_ids(&prepare.task_ids()[0]), install.task_ids());
}

#[test]
fn test_wiring_unknown_tasks_fails() {
    let state = State::in_memory();
    let mut st = state.lock();
    let t1 = st.new_task("download", "...");
    let set = TaskSet::new([t1.as_str()]);

    assert!(set.wait_for(&mut st, "42").unwrap_err().is_not_found());
    assert!(set.add_to_change(&mut st, "7").unwrap_err().is_not_found());
}
