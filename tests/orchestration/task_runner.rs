//! Task Runner Tests
//!
//! Drives the runner pass by pass, the way the engine loop would.

use crate::common::{chain, statuses};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steward_core::orchestration::{Direction, HandlerError, TaskRunner};
use steward_core::registry::handler_fn;
use steward_core::state::State;
use steward_core::state_machine::TaskStatus;

async fn run_passes(runner: &TaskRunner, passes: usize) {
    for _ in 0..passes {
        runner.ensure().unwrap();
        runner.wait().await;
    }
}

#[tokio::test]
async fn test_retry_leaves_status_and_postpones() {
    let state = State::in_memory();
    let runner = TaskRunner::new(state.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    runner.add_handler(
        "flaky",
        handler_fn(move |_| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(HandlerError::retry_after(Duration::from_millis(20), "busy"));
                }
                Ok(())
            }
        }),
        None,
    );
    let t1 = {
        let mut st = state.lock();
        let chg = st.new_change("install", "...");
        chain(&mut st, &chg, "flaky", 1).remove(0)
    };

    run_passes(&runner, 1).await;
    {
        let st = state.lock();
        let task = st.task(&t1).unwrap();
        assert_eq!(task.status(), TaskStatus::Doing);
        assert!(task.at_time().is_some());
    }

    // too early: nothing launched
    run_passes(&runner, 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(40)).await;
    run_passes(&runner, 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.lock().task(&t1).unwrap().status(), TaskStatus::Done);
}

#[tokio::test]
async fn test_wait_outcome_pauses_task() {
    let state = State::in_memory();
    let runner = TaskRunner::new(state.clone());
    runner.add_handler(
        "pause",
        handler_fn(|_| async { Err(HandlerError::wait("waiting for the operator")) }),
        None,
    );
    let (chg, t1) = {
        let mut st = state.lock();
        let chg = st.new_change("install", "...");
        let t1 = chain(&mut st, &chg, "pause", 1).remove(0);
        (chg, t1)
    };

    run_passes(&runner, 2).await;

    let st = state.lock();
    let task = st.task(&t1).unwrap();
    assert_eq!(task.status(), TaskStatus::Wait);
    assert_eq!(task.waited_status(), Some(TaskStatus::Done));
    assert!(!st.change_is_ready(&chg).unwrap());
}

#[tokio::test]
async fn test_failure_rolls_back_the_change() {
    let state = State::in_memory();
    let runner = TaskRunner::new(state.clone());
    let undone = Arc::new(Mutex::new(Vec::new()));
    let seen = undone.clone();
    runner.add_handler(
        "prepare",
        handler_fn(|_| async { Ok(()) }),
        Some(handler_fn(move |ctx| {
            let seen = seen.clone();
            async move {
                assert_eq!(ctx.direction(), Direction::Undo);
                seen.lock().push(ctx.task_id().to_string());
                Ok(())
            }
        })),
    );
    runner.add_handler(
        "break",
        handler_fn(|_| async { Err(HandlerError::failed("disk full")) }),
        None,
    );

    let (chg, ids, other) = {
        let mut st = state.lock();
        let chg = st.new_change("install", "...");
        let mut ids = chain(&mut st, &chg, "prepare", 2);
        let failing = st.new_task("break", "Break things");
        st.task_wait_for(&failing, &ids[1]).unwrap();
        st.add_task(&chg, &failing).unwrap();
        ids.push(failing);
        let after = st.new_task("prepare", "Never runs");
        st.task_wait_for(&after, &ids[2]).unwrap();
        st.add_task(&chg, &after).unwrap();

        let other = st.new_change("install", "Unrelated");
        let other_task = chain(&mut st, &other, "prepare", 1);
        let _ = other_task;
        ids.push(after);
        (chg, ids, other)
    };

    run_passes(&runner, 8).await;

    let st = state.lock();
    assert_eq!(
        statuses(&st, &ids),
        vec![TaskStatus::Undone, TaskStatus::Undone, TaskStatus::Error, TaskStatus::Hold]
    );
    // reverse order: the second task is undone before the first
    assert_eq!(*undone.lock(), vec![ids[1].clone(), ids[0].clone()]);
    assert_eq!(
        st.change_err(&chg).unwrap().unwrap(),
        "cannot perform the following tasks:\n- Break things (disk full)"
    );
    assert!(st.change_is_ready(&chg).unwrap());
    assert_eq!(st.change_status(&other).unwrap(), TaskStatus::Done);
}

#[tokio::test]
async fn test_blocked_tasks_wait_for_running_ones() {
    let state = State::in_memory();
    let runner = TaskRunner::new(state.clone());
    runner.add_handler(
        "hook",
        handler_fn(|ctx| async move {
            ctx.stop_token().cancelled().await;
            Err(HandlerError::retry())
        }),
        None,
    );
    runner.add_blocked(|candidate, running| running.iter().any(|t| t.kind() == candidate.kind()));

    let ids = {
        let mut st = state.lock();
        let chg = st.new_change("configure", "...");
        let a = st.new_task("hook", "...");
        let b = st.new_task("hook", "...");
        st.add_task(&chg, &a).unwrap();
        st.add_task(&chg, &b).unwrap();
        vec![a, b]
    };

    runner.ensure().unwrap();
    assert_eq!(runner.running_count(), 1);
    runner.ensure().unwrap();
    assert_eq!(runner.running_count(), 1);
    assert!(runner.is_running(&ids[0]));
    assert_eq!(state.lock().task(&ids[1]).unwrap().status(), TaskStatus::Do);

    runner.stop_kinds(&["hook"]).await;
    assert_eq!(runner.running_count(), 0);
    // a retried task keeps its status and resumes later
    assert_eq!(state.lock().task(&ids[0]).unwrap().status(), TaskStatus::Doing);
}

#[tokio::test]
async fn test_panicking_handler_fails_task() {
    let state = State::in_memory();
    let runner = TaskRunner::new(state.clone());
    runner.add_handler(
        "explode",
        handler_fn(|_| async {
            if true {
                panic!("boom");
            }
            Ok(())
        }),
        None,
    );
    let t1 = {
        let mut st = state.lock();
        let chg = st.new_change("install", "...");
        chain(&mut st, &chg, "explode", 1).remove(0)
    };

    run_passes(&runner, 1).await;

    let st = state.lock();
    let task = st.task(&t1).unwrap();
    assert_eq!(task.status(), TaskStatus::Error);
    assert_eq!(task.last_error(), Some("handler panicked"));
}

#[tokio::test]
async fn test_interrupted_task_resumes() {
    let state = State::in_memory();
    let runner = TaskRunner::new(state.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    runner.add_handler(
        "resumable",
        handler_fn(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
        None,
    );
    let t1 = {
        let mut st = state.lock();
        let chg = st.new_change("install", "...");
        let t1 = chain(&mut st, &chg, "resumable", 1).remove(0);
        // left behind by a previous process
        st.task_mut(&t1).unwrap().set_status(TaskStatus::Doing).unwrap();
        t1
    };

    run_passes(&runner, 2).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.lock().task(&t1).unwrap().status(), TaskStatus::Done);
}
