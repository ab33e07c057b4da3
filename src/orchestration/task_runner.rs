//! # Task Runner
//!
//! Concurrent scheduler driving every task of every unready change.
//!
//! ## Architecture
//!
//! Each [`TaskRunner::ensure`] pass takes the state lock once and, per change:
//! 1. starts the reverse cascade if any task failed,
//! 2. puts `Abort` tasks without a live handler on hold,
//! 3. discovers viable tasks (see [`viable_task_discovery`]),
//! 4. filters them through the blocking predicates, given everything running
//!    (including tasks launched earlier in the same pass),
//! 5. spawns the handler of each remaining task on the tokio runtime.
//!
//! When a handler returns, its outcome is applied under the state lock:
//!
//! | outcome | effect |
//! |---|---|
//! | `Ok` | `Doing -> Done`, `Undoing -> Undone`, `Abort -> Undo` |
//! | `Retry` | status kept (`Abort -> Hold`), postponed by the retry delay |
//! | `Wait` | `Wait(Done)` forward, `Wait(Undone)` reverse, unless already waiting |
//! | `Failed` | error logged on the task, `Error`, reverse cascade of the change |
//!
//! [`viable_task_discovery`]: crate::orchestration::viable_task_discovery

use crate::config::RunnerConfig;
use crate::error::Result;
use crate::logging::{log_error, log_task_operation};
use crate::models::Task;
use crate::orchestration::viable_task_discovery::{find_viable_tasks, ViableTask};
use crate::orchestration::{Direction, HandlerError, HandlerResult, TaskContext};
use crate::registry::{HandlerFn, HandlerRegistry};
use crate::state::{State, StateGuard};
use crate::state_machine::{TaskEvent, TaskStatus};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Predicate deciding whether `candidate` must not start given the running tasks
pub type BlockedFn = Arc<dyn Fn(&Task, &[&Task]) -> bool + Send + Sync>;

struct RunningTask {
    kind: String,
    stop: CancellationToken,
}

struct RunnerInner {
    state: State,
    registry: HandlerRegistry,
    blocked: RwLock<Vec<BlockedFn>>,
    running: Mutex<HashMap<String, RunningTask>>,
    stopped: AtomicBool,
    changed: Notify,
    default_retry_delay: Duration,
}

/// Scheduler running task handlers as their prerequisites are met
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl TaskRunner {
    pub fn new(state: State) -> Self {
        Self::with_config(state, &RunnerConfig::default())
    }

    pub fn with_config(state: State, config: &RunnerConfig) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                state,
                registry: HandlerRegistry::new(),
                blocked: RwLock::new(Vec::new()),
                running: Mutex::new(HashMap::new()),
                stopped: AtomicBool::new(false),
                changed: Notify::new(),
                default_retry_delay: config.default_retry_delay(),
            }),
        }
    }

    pub fn state(&self) -> &State {
        &self.inner.state
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    /// Register the handlers for a task kind; a missing undo handler makes undo a no-op
    pub fn add_handler(&self, kind: &str, do_handler: HandlerFn, undo_handler: Option<HandlerFn>) {
        self.inner.registry.register(kind, do_handler, undo_handler);
    }

    /// Add a predicate that can keep a task from starting
    pub fn add_blocked<F>(&self, predicate: F)
    where
        F: Fn(&Task, &[&Task]) -> bool + Send + Sync + 'static,
    {
        self.inner.blocked.write().push(Arc::new(predicate));
    }

    pub fn running_count(&self) -> usize {
        self.inner.running.lock().len()
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.inner.running.lock().contains_key(task_id)
    }

    fn running_ids(&self) -> HashSet<String> {
        self.inner.running.lock().keys().cloned().collect()
    }

    fn cancel_tasks(&self, task_ids: &[String]) {
        let running = self.inner.running.lock();
        for id in task_ids {
            if let Some(task) = running.get(id) {
                debug!(task_id = %id, "Stopping aborted task");
                task.stop.cancel();
            }
        }
    }

    /// Run one scheduling pass, launching every task that may start now
    pub fn ensure(&self) -> Result<()> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let now = Utc::now();
        let mut st = self.inner.state.lock();
        let mut next_wakeup: Option<DateTime<Utc>> = None;

        for change_id in st.change_ids() {
            if st.change_is_ready(&change_id)? {
                st.refresh_change_ready_time(&change_id)?;
                continue;
            }

            let failed = st
                .change_tasks(&change_id)?
                .iter()
                .any(|t| t.status() == TaskStatus::Error);
            if failed {
                let aborted = st.abort_change(&change_id)?;
                self.cancel_tasks(&aborted);
            }

            let running = self.running_ids();
            let held: Vec<String> = st
                .change_tasks(&change_id)?
                .iter()
                .filter(|t| t.status() == TaskStatus::Abort && !running.contains(t.id()))
                .map(|t| t.id().to_string())
                .collect();
            for id in held {
                st.task_mut(&id)?.apply(&TaskEvent::Hold)?;
            }

            let discovery = find_viable_tasks(&st, &change_id, &running, now)?;
            if let Some(at) = discovery.next_wakeup {
                next_wakeup = Some(next_wakeup.map_or(at, |n| n.min(at)));
            }
            for viable in discovery.viable {
                if self.is_blocked(&st, &viable.task_id) {
                    debug!(task_id = %viable.task_id, kind = %viable.kind, "Task blocked");
                    continue;
                }
                self.launch(&mut st, viable)?;
            }

            st.refresh_change_ready_time(&change_id)?;
        }

        if let Some(at) = next_wakeup {
            st.ensure_before((at - now).to_std().unwrap_or_default());
        }
        Ok(())
    }

    fn is_blocked(&self, st: &StateGuard<'_>, task_id: &str) -> bool {
        let predicates = self.inner.blocked.read();
        if predicates.is_empty() {
            return false;
        }
        let Ok(candidate) = st.task(task_id) else {
            return true;
        };
        let running_ids = self.running_ids();
        let running: Vec<&Task> = running_ids
            .iter()
            .filter_map(|id| st.task(id).ok())
            .collect();
        predicates.iter().any(|blocked| blocked(candidate, &running))
    }

    fn launch(&self, st: &mut StateGuard<'_>, viable: ViableTask) -> Result<()> {
        let task = st.task_mut(&viable.task_id)?;
        if !viable.resume {
            task.apply(&TaskEvent::Start)?;
        }
        task.set_at_time(None);
        let change_id = task.change_id().map(str::to_string);
        let status = task.status();

        let handler = self.inner.registry.get(&viable.kind).and_then(|pair| match viable.direction {
            Direction::Do => Some(pair.do_handler),
            Direction::Undo => pair.undo_handler,
        });

        let stop = CancellationToken::new();
        self.inner.running.lock().insert(
            viable.task_id.clone(),
            RunningTask {
                kind: viable.kind.clone(),
                stop: stop.clone(),
            },
        );

        log_task_operation(
            if viable.resume { "resume" } else { "launch" },
            &viable.task_id,
            &viable.kind,
            change_id.as_deref(),
            &status.to_string(),
            None,
        );

        let ctx = TaskContext::new(
            self.inner.state.clone(),
            viable.task_id.clone(),
            change_id,
            viable.kind.clone(),
            viable.direction,
            stop,
        );
        let runner = self.clone();
        tokio::spawn(async move {
            let result = match handler {
                Some(handler) => AssertUnwindSafe(handler(ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(HandlerError::failed("handler panicked"))),
                None if viable.direction == Direction::Do => Err(HandlerError::failed(format!(
                    "no handler for task kind {:?}",
                    viable.kind
                ))),
                None => Ok(()),
            };
            runner.finish(&viable.task_id, viable.direction, result);
        });
        Ok(())
    }

    fn finish(&self, task_id: &str, direction: Direction, result: HandlerResult) {
        let mut st = self.inner.state.lock();
        if let Err(e) = self.apply_outcome(&mut st, task_id, direction, result) {
            log_error("task_runner", "apply_outcome", &e.to_string(), Some(task_id));
        }
        self.inner.running.lock().remove(task_id);
        st.ensure_before(Duration::ZERO);
        drop(st);
        self.inner.changed.notify_waiters();
    }

    fn apply_outcome(
        &self,
        st: &mut StateGuard<'_>,
        task_id: &str,
        direction: Direction,
        result: HandlerResult,
    ) -> Result<()> {
        let task = st.task_mut(task_id)?;
        let status = task.status();
        let kind = task.kind().to_string();
        let change_id = task.change_id().map(str::to_string);

        match result {
            Ok(()) => {
                if status.is_active() {
                    task.apply(&TaskEvent::Complete)?;
                }
                log_task_operation(
                    "complete",
                    task_id,
                    &kind,
                    change_id.as_deref(),
                    &task.status().to_string(),
                    None,
                );
            }
            Err(HandlerError::Retry { after, reason }) => {
                if status == TaskStatus::Abort {
                    task.apply(&TaskEvent::Hold)?;
                } else {
                    let delay = after.unwrap_or(self.inner.default_retry_delay);
                    let at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                    task.set_at_time(Some(at));
                    st.ensure_before(delay);
                }
                debug!(task_id = %task_id, kind = %kind, reason = %reason, "Task will be retried");
            }
            Err(HandlerError::Wait { reason }) => {
                if status != TaskStatus::Wait {
                    let waited = match direction {
                        Direction::Do => TaskStatus::Done,
                        Direction::Undo => TaskStatus::Undone,
                    };
                    task.set_to_wait(waited)?;
                }
                debug!(task_id = %task_id, kind = %kind, reason = %reason, "Task set to wait");
            }
            Err(HandlerError::Failed(err)) => {
                let message = format!("{err:#}");
                task.errorf(&message);
                if status.is_active() {
                    task.apply(&TaskEvent::fail_with_error(message.clone()))?;
                } else {
                    task.set_status(TaskStatus::Error)?;
                }
                warn!(task_id = %task_id, kind = %kind, error = %message, "Task failed");
                if let Some(change_id) = change_id {
                    let aborted = st.abort_change(&change_id)?;
                    self.cancel_tasks(&aborted);
                }
            }
        }
        Ok(())
    }

    /// Wait until no handler is running
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.changed.notified();
            if self.inner.running.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Stop the running tasks of the given kinds and wait for them to return
    pub async fn stop_kinds(&self, kinds: &[&str]) {
        let is_target = |task: &RunningTask| kinds.contains(&task.kind.as_str());
        for task in self.inner.running.lock().values().filter(|t| is_target(*t)) {
            task.stop.cancel();
        }
        loop {
            let notified = self.inner.changed.notified();
            if !self.inner.running.lock().values().any(|t| is_target(t)) {
                return;
            }
            notified.await;
        }
    }

    /// Stop every running task and launch nothing further
    pub async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        for task in self.inner.running.lock().values() {
            task.stop.cancel();
        }
        self.wait().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}
