//! # Restart Coordinator
//!
//! Lets tasks ask for a service or host restart and resumes exactly the right
//! tasks once the restart verifiably happened.
//!
//! ## Flow
//!
//! 1. A handler calls [`RestartManager::request_restart_for_task`] (or
//!    [`RestartManager::task_wait_for_restart`]). System restarts suspend the task,
//!    or its same-lane dependents, in `Wait`, tagged with the current boot id,
//!    and record a waiter in the change's [`RestartInfo`].
//! 2. Once nothing else in the change can run, the manager's ensure pass calls
//!    [`RestartManager::request_restart_for_change`], which performs the restart
//!    through the [`RestartHandler`].
//! 3. After the reboot, [`RestartManager::start_up`] sees a different boot id and
//!    releases every waiting task to its waited status.

pub mod handler;
pub mod notifier;
pub mod types;

pub use handler::RestartHandler;
pub use notifier::{NotifierError, RebootNotifier};
pub use types::{RebootInfo, RestartInfo, RestartType, RestartWaiter};

use crate::constants::{change_keys, restart_messages, state_keys, task_keys};
use crate::error::{Result, StewardError};
use crate::logging::log_restart_operation;
use crate::models::{Change, Task};
use crate::orchestration::viable_task_discovery::is_runnable;
use crate::orchestration::{HandlerError, StateManager};
use crate::state::{State, StateGuard};
use crate::state_machine::{TaskEvent, TaskStatus};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates restart requests with the tasks waiting on them
pub struct RestartManager {
    state: State,
    boot_id: RwLock<String>,
    handler: Option<Arc<dyn RestartHandler>>,
    pending: Mutex<RestartType>,
    classic: bool,
    notifier: Option<RebootNotifier>,
}

impl RestartManager {
    pub fn new(
        state: State,
        boot_id: impl Into<String>,
        handler: Option<Arc<dyn RestartHandler>>,
    ) -> Result<Self> {
        let boot_id = boot_id.into();
        if boot_id.is_empty() {
            return Err(StewardError::Restart("boot id cannot be empty".to_string()));
        }
        Ok(Self {
            state,
            boot_id: RwLock::new(boot_id),
            handler,
            pending: Mutex::new(RestartType::Unset),
            classic: false,
            notifier: None,
        })
    }

    /// Treat the host as classic: rollbacks never reboot it automatically
    pub fn with_classic(mut self, classic: bool) -> Self {
        self.classic = classic;
        self
    }

    pub fn with_notifier(mut self, notifier: Option<RebootNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn is_classic(&self) -> bool {
        self.classic
    }

    pub fn boot_id(&self) -> String {
        self.boot_id.read().clone()
    }

    /// Swap the current boot identifier
    pub fn replace_boot_id(&self, boot_id: impl Into<String>) {
        *self.boot_id.write() = boot_id.into();
    }

    /// Whether a restart was requested in this process, and of which kind
    pub fn pending(&self) -> (bool, RestartType) {
        let kind = *self.pending.lock();
        (kind != RestartType::Unset, kind)
    }

    /// Record the restart as pending and hand it to the restart handler
    pub fn request(
        &self,
        st: &mut StateGuard<'_>,
        kind: RestartType,
        reboot_info: Option<&RebootInfo>,
    ) -> Result<()> {
        *self.pending.lock() = kind;
        let boot_id = self.boot_id();
        if kind.is_system() {
            st.set(state_keys::SYSTEM_RESTART_FROM_BOOT_ID, &boot_id)?;
        }
        log_restart_operation("request", &kind.to_string(), None, &boot_id, None);
        if let Some(handler) = &self.handler {
            handler.handle_restart(kind, reboot_info);
        }
        Ok(())
    }

    /// Ask for a restart on behalf of a task that is otherwise finished
    ///
    /// Non-system restarts complete the task with `final_status` and are requested
    /// right away. System restarts suspend either the task itself or its same-lane
    /// dependents until the host rebooted; the restart itself is requested later,
    /// once the change has nothing else to run.
    pub fn request_restart_for_task(
        &self,
        st: &mut StateGuard<'_>,
        task_id: &str,
        requester: &str,
        final_status: TaskStatus,
        kind: RestartType,
        reboot_info: Option<RebootInfo>,
    ) -> Result<()> {
        if !kind.is_system() {
            st.task_mut(task_id)?.set_status(final_status)?;
            return self.request(st, kind, reboot_info.as_ref());
        }

        let task = st.task_mut(task_id)?;
        task.logf(format!("System restart requested by {requester:?}"));
        let change_id = owning_change(task)?;
        let reverse = final_status.is_reverse();

        if self.classic && reverse && !change_flag(st.change(&change_id)?, change_keys::SYSTEM_RESTART_IMMEDIATE)? {
            let task = st.task_mut(task_id)?;
            task.logf(restart_messages::CLASSIC_UNDO_SKIPPED);
            task.set_status(final_status)?;
            return Ok(());
        }

        let mut info = load_restart_info(st.change(&change_id)?)?.unwrap_or_default();
        info.add_requester(requester);
        info.merge_type(kind);
        if reboot_info.is_some() {
            info.reboot_info = reboot_info;
        }

        let partners = lane_partners(st, task_id, reverse)?;
        if partners.is_empty() {
            self.mark_waiting(st, &change_id, task_id, final_status, &mut info)?;
        } else {
            st.task_mut(task_id)?.set_status(final_status)?;
            for partner in &partners {
                let status = st.task(partner)?.status();
                self.mark_waiting(st, &change_id, partner, status, &mut info)?;
            }
        }
        debug!(
            task_id = %task_id,
            change_id = %change_id,
            partners = partners.len(),
            "System restart requested for task"
        );
        st.change_mut(&change_id)?.set(change_keys::RESTART_INFO, &info)
    }

    /// Suspend an in-progress task until the host rebooted
    ///
    /// Meant to be returned from a handler: the error is the `Wait` outcome the
    /// runner expects. The task reruns in the same direction after the reboot.
    pub fn task_wait_for_restart(
        &self,
        st: &mut StateGuard<'_>,
        task_id: &str,
    ) -> std::result::Result<(), HandlerError> {
        let task = st.task(task_id)?;
        let waited = match task.status() {
            TaskStatus::Doing => TaskStatus::Do,
            TaskStatus::Undoing => TaskStatus::Undo,
            _ => {
                return Err(HandlerError::failed(
                    "only tasks currently in progress (doing/undoing) are supported",
                ))
            }
        };
        let kind = task.kind().to_string();
        let change_id = owning_change(task)?;

        if self.classic && waited == TaskStatus::Undo {
            st.task_mut(task_id)?.logf(restart_messages::CLASSIC_UNDO_SKIPPED);
            return Ok(());
        }

        let mut info = load_restart_info(st.change(&change_id)?)?.unwrap_or_default();
        self.mark_waiting(st, &change_id, task_id, waited, &mut info)?;
        st.change_mut(&change_id)?.set(change_keys::RESTART_INFO, &info)?;
        st.task_mut(task_id)?
            .logf(format!("Task {kind:?} is pending reboot to continue"));
        Err(HandlerError::wait(restart_messages::POSTPONE_REASON))
    }

    /// Perform the restart a change's suspended tasks are waiting for
    pub fn request_restart_for_change(&self, st: &mut StateGuard<'_>, change_id: &str) -> Result<()> {
        let change = st.change(change_id)?;
        let Some(mut info) = load_restart_info(change)?.filter(|i| !i.waiters.is_empty()) else {
            let waiting = st
                .change_tasks(change_id)?
                .iter()
                .any(|t| t.status() == TaskStatus::Wait);
            if waiting {
                return Err(StewardError::Restart(format!(
                    "change {change_id} is waiting to continue but has not requested any reboots"
                )));
            }
            return Ok(());
        };

        let immediate = change_flag(change, change_keys::SYSTEM_RESTART_IMMEDIATE)?;
        let kind = if immediate {
            info.restart_type.immediate()
        } else {
            info.restart_type
        };
        let reverse = info.waiters.iter().any(|w| w.status.is_reverse());
        let boot_id = self.boot_id();

        if self.classic && reverse && !immediate {
            for waiter in &info.waiters {
                release_task(st, &waiter.task_id, restart_messages::CLASSIC_UNDO_SKIPPED)?;
            }
            let change = st.change_mut(change_id)?;
            change.clear(change_keys::RESTART_INFO);
            change.clear(change_keys::WAIT_FOR_SYSTEM_RESTART);
            log_restart_operation(
                "skip",
                &kind.to_string(),
                Some(change_id),
                &boot_id,
                Some(restart_messages::CLASSIC_UNDO_SKIPPED),
            );
            return Ok(());
        }

        if self.classic {
            if let Some(notifier) = &self.notifier {
                for requester in &info.requesters {
                    if let Err(e) = notifier.notify(requester) {
                        warn!(change_id = %change_id, requester = %requester, "cannot notify about pending reboot: {e}");
                    }
                }
            }
        }

        info.requested = true;
        let change = st.change_mut(change_id)?;
        change.set(change_keys::WAIT_FOR_SYSTEM_RESTART, true)?;
        change.set(change_keys::SYSTEM_RESTART_FROM_BOOT_ID, &boot_id)?;
        change.set(change_keys::RESTART_INFO, &info)?;
        log_restart_operation(
            "request_for_change",
            &kind.to_string(),
            Some(change_id),
            &boot_id,
            None,
        );
        self.request(st, kind, info.reboot_info.as_ref())
    }

    /// Whether the only thing keeping a change from progressing is a system restart
    pub fn pending_for_system_restart(&self, st: &StateGuard<'_>, change_id: &str) -> Result<bool> {
        let mut waiting = false;
        for task in st.change_tasks(change_id)? {
            match task.status() {
                TaskStatus::Doing | TaskStatus::Undoing | TaskStatus::Abort => return Ok(false),
                TaskStatus::Do | TaskStatus::Undo if is_runnable(st, task) => return Ok(false),
                TaskStatus::Wait => {
                    if !task.has(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID) {
                        return Ok(false);
                    }
                    waiting = true;
                    if !wait_partners_consistent(st, task)? {
                        return Ok(false);
                    }
                }
                _ => {}
            }
        }
        Ok(waiting)
    }

    /// Reconcile suspended tasks with the boot the process started in
    pub fn start_up(&self) -> Result<()> {
        let boot_id = self.boot_id();
        let mut st = self.state.lock();

        let rebooted = match st.get::<String>(state_keys::SYSTEM_RESTART_FROM_BOOT_ID) {
            Ok(from) if from == boot_id => false,
            Ok(_) => {
                st.remove(state_keys::SYSTEM_RESTART_FROM_BOOT_ID);
                true
            }
            Err(e) if e.is_not_found() => true,
            Err(e) => return Err(e),
        };
        if let Some(handler) = &self.handler {
            if rebooted {
                handler.reboot_as_expected(&mut st)?;
            } else {
                warn!(boot_id = %boot_id, "Requested system restart did not happen");
                handler.reboot_did_not_happen(&mut st)?;
            }
        }

        let released = self.release_rebooted_tasks(&mut st, &boot_id)?;
        if released > 0 {
            info!(released, boot_id = %boot_id, "Resumed tasks waiting for system restart");
        }
        Ok(())
    }

    /// Release every `Wait` task tagged with another boot id
    fn release_rebooted_tasks(&self, st: &mut StateGuard<'_>, boot_id: &str) -> Result<usize> {
        let mut released = Vec::new();
        for task in st.tasks() {
            if task.status() != TaskStatus::Wait {
                continue;
            }
            if let Some(from) = boot_id_tag(task)? {
                if from != boot_id {
                    released.push((task.id().to_string(), task.change_id().map(str::to_string)));
                }
            }
        }

        let mut changes = BTreeSet::new();
        for (task_id, change_id) in &released {
            release_task(st, task_id, restart_messages::RESTART_COMPLETED)?;
            if let Some(change_id) = change_id {
                if let Some(mut info) = load_restart_info(st.change(change_id)?)? {
                    if info.remove_waiter(task_id) {
                        st.change_mut(change_id)?.set(change_keys::RESTART_INFO, &info)?;
                    }
                }
                changes.insert(change_id.clone());
            }
        }

        for change_id in changes {
            let still_waiting = st.change_tasks(&change_id)?.iter().any(|t| {
                t.status() == TaskStatus::Wait && t.has(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID)
            });
            if !still_waiting {
                let change = st.change_mut(&change_id)?;
                change.clear(change_keys::WAIT_FOR_SYSTEM_RESTART);
                change.clear(change_keys::SYSTEM_RESTART_FROM_BOOT_ID);
                change.clear(change_keys::RESTART_INFO);
            }
        }
        Ok(released.len())
    }

    /// Request the batched restarts of changes that cannot progress without one
    pub fn ensure(&self) -> Result<()> {
        let mut st = self.state.lock();
        for change_id in st.change_ids() {
            if st.change_is_ready(&change_id)? {
                continue;
            }
            let Some(info) = load_restart_info(st.change(&change_id)?)? else {
                continue;
            };
            if info.waiters.is_empty() || info.requested {
                continue;
            }
            if self.pending_for_system_restart(&st, &change_id)? {
                self.request_restart_for_change(&mut st, &change_id)?;
            }
        }
        Ok(())
    }

    fn mark_waiting(
        &self,
        st: &mut StateGuard<'_>,
        change_id: &str,
        task_id: &str,
        waited: TaskStatus,
        info: &mut RestartInfo,
    ) -> Result<()> {
        let boot_id = self.boot_id();
        let task = st.task_mut(task_id)?;
        task.set_to_wait(waited)?;
        task.set(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID, &boot_id)?;
        info.add_waiter(task_id, waited);
        st.change_mut(change_id)?
            .set(change_keys::WAIT_FOR_SYSTEM_RESTART, true)
    }
}

#[async_trait]
impl StateManager for RestartManager {
    fn name(&self) -> &'static str {
        "restart-manager"
    }

    async fn start_up(&self) -> Result<()> {
        RestartManager::start_up(self)
    }

    async fn ensure(&self) -> Result<()> {
        RestartManager::ensure(self)
    }
}

fn owning_change(task: &Task) -> Result<String> {
    task.change_id().map(str::to_string).ok_or_else(|| {
        StewardError::Restart(format!("task {} does not belong to a change", task.id()))
    })
}

fn change_flag(change: &Change, key: &str) -> Result<bool> {
    match change.get::<bool>(key) {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn load_restart_info(change: &Change) -> Result<Option<RestartInfo>> {
    match change.get::<RestartInfo>(change_keys::RESTART_INFO) {
        Ok(info) => Ok(Some(info)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn boot_id_tag(task: &Task) -> Result<Option<String>> {
    match task.get::<String>(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID) {
        Ok(boot_id) => Ok(Some(boot_id)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Move a waiting task on to its waited status and drop its boot id tag
fn release_task(st: &mut StateGuard<'_>, task_id: &str, message: &str) -> Result<()> {
    let task = st.task_mut(task_id)?;
    if task.status() == TaskStatus::Wait {
        task.apply(&TaskEvent::Release)?;
    }
    task.clear(task_keys::WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID);
    task.logf(message);
    Ok(())
}

/// Same-lane tasks reachable from `task_id` along halt edges (forward) or wait
/// edges (reverse) that still have to run in that direction
fn lane_partners(st: &StateGuard<'_>, task_id: &str, reverse: bool) -> Result<Vec<String>> {
    let origin = st.task(task_id)?;
    let mut seen = HashSet::from([task_id.to_string()]);
    let mut queue = VecDeque::from([task_id.to_string()]);
    let mut partners = Vec::new();
    let pending = if reverse { TaskStatus::Undo } else { TaskStatus::Do };

    while let Some(current) = queue.pop_front() {
        let next = if reverse {
            st.wait_tasks(&current)?
        } else {
            st.halt_tasks(&current)
        };
        for task in next {
            if !task.shares_lane_with(origin) || !seen.insert(task.id().to_string()) {
                continue;
            }
            if task.status() == pending {
                partners.push(task.id().to_string());
            }
            queue.push_back(task.id().to_string());
        }
    }
    Ok(partners)
}

fn is_forward_wait(task: &Task) -> bool {
    task.status() == TaskStatus::Wait
        && matches!(task.waited_status(), Some(TaskStatus::Do | TaskStatus::Done))
}

fn is_reverse_wait(task: &Task) -> bool {
    task.status() == TaskStatus::Wait
        && matches!(task.waited_status(), Some(TaskStatus::Undo | TaskStatus::Undone))
}

fn wait_partners_consistent(st: &StateGuard<'_>, task: &Task) -> Result<bool> {
    if is_forward_wait(task) {
        return Ok(st
            .halt_tasks(task.id())
            .iter()
            .all(|halt| halt.status() == TaskStatus::Do || is_forward_wait(halt)));
    }
    if is_reverse_wait(task) {
        return Ok(st
            .wait_tasks(task.id())?
            .iter()
            .all(|pre| pre.status() == TaskStatus::Undo || is_reverse_wait(pre)));
    }
    Ok(true)
}
