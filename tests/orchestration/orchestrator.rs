//! End-to-end runs through the orchestrator, including a simulated reboot
//! between two orchestrator instances sharing one state file.

use crate::common::RecordingRestartHandler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use steward_core::config::{ConfigManager, StewardConfig};
use steward_core::constants::task_keys;
use steward_core::orchestration::Orchestrator;
use steward_core::registry::handler_fn;
use steward_core::restart::RestartType;
use steward_core::state_machine::TaskStatus;

fn orchestrator(dir: &Path, boot_id: &str, handler: Arc<RecordingRestartHandler>) -> Orchestrator {
    let mut config = StewardConfig::default();
    config.state.path = dir.join("state.json");
    config.restart.boot_id = Some(boot_id.to_string());
    let manager = ConfigManager::from_config(config).unwrap();
    let orchestrator = Orchestrator::new(manager, Some(handler)).unwrap();

    let restart = orchestrator.restart().clone();
    orchestrator.runner().add_handler(
        "update-kernel",
        handler_fn(move |ctx| {
            let restart = restart.clone();
            async move {
                let mut st = ctx.state().lock();
                restart.request_restart_for_task(
                    &mut st,
                    ctx.task_id(),
                    "pc-kernel",
                    TaskStatus::Done,
                    RestartType::System,
                    None,
                )?;
                Ok(())
            }
        }),
        None,
    );
    orchestrator
        .runner()
        .add_handler("noop", handler_fn(|_| async { Ok(()) }), None);
    orchestrator
}

#[tokio::test]
async fn test_reboot_resumes_change() {
    let dir = tempfile::tempdir().unwrap();
    let first_handler = Arc::new(RecordingRestartHandler::default());

    let (chg, kernel, after) = {
        let first = orchestrator(dir.path(), "boot-A", first_handler.clone());
        let (chg, kernel, after) = {
            let mut st = first.state().lock();
            let chg = st.new_change("refresh", "Refresh \"pc-kernel\"");
            let kernel = st.new_task("update-kernel", "Update kernel");
            let after = st.new_task("noop", "Finish refresh");
            st.task_wait_for(&after, &kernel).unwrap();
            st.add_task(&chg, &kernel).unwrap();
            st.add_task(&chg, &after).unwrap();
            (chg, kernel, after)
        };

        first.start_up().await.unwrap();
        first.settle(Duration::from_secs(5)).await.unwrap();

        assert_eq!(first.restart().pending(), (true, RestartType::System));
        {
            let st = first.state().lock();
            assert_eq!(st.task(&kernel).unwrap().status(), TaskStatus::Done);
            let waiting = st.task(&after).unwrap();
            assert_eq!(waiting.status(), TaskStatus::Wait);
            assert_eq!(waiting.waited_status(), Some(TaskStatus::Do));
            assert_eq!(
                waiting
                    .get::<String>(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID)
                    .unwrap(),
                "boot-A"
            );
            assert!(!st.change_is_ready(&chg).unwrap());
        }
        first.shutdown().await;
        (chg, kernel, after)
    };
    assert_eq!(first_handler.restart_kinds(), vec![RestartType::System]);

    let second_handler = Arc::new(RecordingRestartHandler::default());
    let second = orchestrator(dir.path(), "boot-B", second_handler.clone());
    second.start_up().await.unwrap();
    assert_eq!(*second_handler.rebooted_as_expected.lock(), 1);
    second.settle(Duration::from_secs(5)).await.unwrap();

    let st = second.state().lock();
    assert_eq!(st.task(&kernel).unwrap().status(), TaskStatus::Done);
    assert_eq!(st.task(&after).unwrap().status(), TaskStatus::Done);
    assert_eq!(st.change_status(&chg).unwrap(), TaskStatus::Done);
    assert!(second_handler.restart_kinds().is_empty());
}

#[tokio::test]
async fn test_restart_without_reboot_keeps_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let handler = Arc::new(RecordingRestartHandler::default());

    let after = {
        let first = orchestrator(dir.path(), "boot-A", handler.clone());
        let after = {
            let mut st = first.state().lock();
            let chg = st.new_change("refresh", "...");
            let kernel = st.new_task("update-kernel", "...");
            let after = st.new_task("noop", "...");
            st.task_wait_for(&after, &kernel).unwrap();
            st.add_task(&chg, &kernel).unwrap();
            st.add_task(&chg, &after).unwrap();
            after
        };
        first.start_up().await.unwrap();
        first.settle(Duration::from_secs(5)).await.unwrap();
        first.shutdown().await;
        after
    };

    let again = orchestrator(dir.path(), "boot-A", handler.clone());
    again.start_up().await.unwrap();
    again.settle(Duration::from_secs(5)).await.unwrap();

    assert_eq!(*handler.reboot_did_not_happen.lock(), 1);
    assert_eq!(again.state().lock().task(&after).unwrap().status(), TaskStatus::Wait);
}
