//! # State Store
//!
//! The single, lock-guarded document holding every change, every task and the
//! process-wide keyed data.
//!
//! ## Architecture
//!
//! - [`State`] is a cheap cloneable handle shared by the task runner, the
//!   restart coordinator and every handler.
//! - All access goes through a [`StateGuard`] obtained from [`State::lock`]. The
//!   guard holds the only lock over the document; it is `!Send`, so it can never
//!   be held across an `.await`.
//! - Every mutation marks the document modified. Dropping a guard over a
//!   modified document checkpoints it through the configured [`Backend`]. A
//!   failed checkpoint is logged and the document stays modified, so the next
//!   unlock retries.
//!
//! ## Usage
//!
//! ```rust
//! use steward_core::state::State;
//!
//! let state = State::in_memory();
//! let mut st = state.lock();
//! let chg = st.new_change("install", "Install \"hello\"");
//! let t1 = st.new_task("download", "Download \"hello\"");
//! let t2 = st.new_task("link", "Link \"hello\"");
//! st.task_wait_for(&t2, &t1).unwrap();
//! st.add_task(&chg, &t1).unwrap();
//! st.add_task(&chg, &t2).unwrap();
//! assert!(!st.change_is_ready(&chg).unwrap());
//! ```

pub mod persistence;

use crate::constants::status_groups;
use crate::error::{Result, StewardError};
use crate::logging::log_change_operation;
use crate::models::{Change, CustomData, Task};
use crate::state_machine::{determine_target_state, TaskEvent, TaskStatus};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use persistence::{Backend, EnsureSignal, FileBackend, MemoryBackend};

/// Serialized form of the whole state
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StateData {
    #[serde(default)]
    data: CustomData,
    #[serde(default)]
    changes: BTreeMap<String, Change>,
    #[serde(default)]
    tasks: BTreeMap<String, Task>,
    #[serde(default)]
    last_change_id: u64,
    #[serde(default)]
    last_task_id: u64,
    #[serde(default)]
    last_lane_id: u32,
    #[serde(skip)]
    modified: bool,
}

struct StateInner {
    data: Mutex<StateData>,
    backend: Arc<dyn Backend>,
}

/// Shared handle to the state document
#[derive(Clone)]
pub struct State {
    inner: Arc<StateInner>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State").finish_non_exhaustive()
    }
}

impl State {
    /// Create an empty state checkpointing through `backend`
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::from_data(StateData::default(), backend)
    }

    /// Create an empty state backed by a [`MemoryBackend`]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Restore a state from a previously checkpointed document
    pub fn from_reader<R: Read>(reader: R, backend: Arc<dyn Backend>) -> Result<Self> {
        let data: StateData = serde_json::from_reader(reader)
            .map_err(|e| StewardError::Serialization(format!("cannot read state: {e}")))?;
        Ok(Self::from_data(data, backend))
    }

    fn from_data(data: StateData, backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                data: Mutex::new(data),
                backend,
            }),
        }
    }

    /// Acquire the state lock
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            data: self.inner.data.lock(),
            backend: self.inner.backend.as_ref(),
        }
    }
}

/// Load the state document at `path`, or start empty when it does not exist
pub fn load_state(path: &Path, backend: Arc<dyn Backend>) -> Result<State> {
    match std::fs::File::open(path) {
        Ok(file) => {
            debug!(path = %path.display(), "Loading state");
            State::from_reader(std::io::BufReader::new(file), backend)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file, starting empty");
            Ok(State::new(backend))
        }
        Err(e) => Err(StewardError::Persistence(format!(
            "cannot open {}: {e}",
            path.display()
        ))),
    }
}

/// Exclusive access to the state; checkpoints on drop when modified
pub struct StateGuard<'a> {
    data: MutexGuard<'a, StateData>,
    backend: &'a dyn Backend,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.data.modified {
            return;
        }
        match serde_json::to_vec(&*self.data) {
            Ok(bytes) => match self.backend.checkpoint(&bytes) {
                Ok(()) => self.data.modified = false,
                Err(e) => warn!(error = %e, "Cannot checkpoint state, will retry on next unlock"),
            },
            Err(e) => warn!(error = %e, "Cannot serialize state for checkpoint"),
        }
    }
}

fn numeric_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

impl StateGuard<'_> {
    fn mark_modified(&mut self) {
        self.data.modified = true;
    }

    pub fn is_modified(&self) -> bool {
        self.data.modified
    }

    /// Serialize the whole document
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&*self.data)?)
    }

    /// Ask the engine to run an ensure pass within `delay`
    pub fn ensure_before(&self, delay: Duration) {
        self.backend.ensure_before(delay);
    }

    // Process-wide keyed data

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.data.data.get(key)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.mark_modified();
        self.data.data.set(key, value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.data.has(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.data.data.remove(key);
        if removed {
            self.mark_modified();
        }
        removed
    }

    // Graph construction

    /// Create a change and return its ID
    pub fn new_change(&mut self, kind: &str, summary: &str) -> String {
        self.data.last_change_id += 1;
        let id = self.data.last_change_id.to_string();
        self.data
            .changes
            .insert(id.clone(), Change::new(id.clone(), kind, summary));
        self.mark_modified();
        id
    }

    /// Create a task, detached until added to a change, and return its ID
    pub fn new_task(&mut self, kind: &str, summary: &str) -> String {
        self.data.last_task_id += 1;
        let id = self.data.last_task_id.to_string();
        self.data
            .tasks
            .insert(id.clone(), Task::new(id.clone(), kind, summary));
        self.mark_modified();
        id
    }

    /// Allocate a fresh lane tag
    pub fn new_lane(&mut self) -> u32 {
        self.data.last_lane_id += 1;
        self.mark_modified();
        self.data.last_lane_id
    }

    /// Add a task to a change; a task belongs to at most one change
    pub fn add_task(&mut self, change_id: &str, task_id: &str) -> Result<()> {
        if !self.data.changes.contains_key(change_id) {
            return Err(StewardError::ChangeNotFound(change_id.to_string()));
        }
        let task = self
            .data
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StewardError::TaskNotFound(task_id.to_string()))?;
        match task.change_id() {
            Some(current) if current != change_id => {
                return Err(StewardError::Internal(format!(
                    "task {task_id} already belongs to change {current}"
                )))
            }
            _ => task.set_change(change_id),
        }
        if let Some(change) = self.data.changes.get_mut(change_id) {
            change.add_task_id(task_id);
        }
        self.mark_modified();
        Ok(())
    }

    /// Make `task_id` wait for `prerequisite_id`
    pub fn task_wait_for(&mut self, task_id: &str, prerequisite_id: &str) -> Result<()> {
        if !self.data.tasks.contains_key(prerequisite_id) {
            return Err(StewardError::TaskNotFound(prerequisite_id.to_string()));
        }
        if task_id == prerequisite_id {
            return Err(StewardError::Internal(format!(
                "task {task_id} cannot wait for itself"
            )));
        }
        self.task_mut(task_id)?.add_wait_task(prerequisite_id);
        Ok(())
    }

    // Lookups

    pub fn change(&self, id: &str) -> Result<&Change> {
        self.data
            .changes
            .get(id)
            .ok_or_else(|| StewardError::ChangeNotFound(id.to_string()))
    }

    pub fn change_mut(&mut self, id: &str) -> Result<&mut Change> {
        self.data.modified = true;
        self.data
            .changes
            .get_mut(id)
            .ok_or_else(|| StewardError::ChangeNotFound(id.to_string()))
    }

    pub fn task(&self, id: &str) -> Result<&Task> {
        self.data
            .tasks
            .get(id)
            .ok_or_else(|| StewardError::TaskNotFound(id.to_string()))
    }

    pub fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.data.modified = true;
        self.data
            .tasks
            .get_mut(id)
            .ok_or_else(|| StewardError::TaskNotFound(id.to_string()))
    }

    /// All changes, ordered by ID
    pub fn changes(&self) -> Vec<&Change> {
        let mut changes: Vec<_> = self.data.changes.values().collect();
        changes.sort_by(|a, b| numeric_order(a.id(), b.id()));
        changes
    }

    /// All tasks, ordered by ID
    pub fn tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<_> = self.data.tasks.values().collect();
        tasks.sort_by(|a, b| numeric_order(a.id(), b.id()));
        tasks
    }

    pub fn change_ids(&self) -> Vec<String> {
        self.changes().iter().map(|c| c.id().to_string()).collect()
    }

    /// Tasks of a change in the order they were added
    pub fn change_tasks(&self, change_id: &str) -> Result<Vec<&Task>> {
        self.change(change_id)?
            .task_ids()
            .iter()
            .map(|id| self.task(id))
            .collect()
    }

    /// IDs of the tasks that wait for `task_id`, derived from wait edges
    pub fn halt_task_ids(&self, task_id: &str) -> Vec<String> {
        let mut halts: Vec<String> = self
            .data
            .tasks
            .values()
            .filter(|t| t.wait_task_ids().iter().any(|id| id == task_id))
            .map(|t| t.id().to_string())
            .collect();
        halts.sort_by(|a, b| numeric_order(a, b));
        halts
    }

    pub fn halt_tasks(&self, task_id: &str) -> Vec<&Task> {
        self.halt_task_ids(task_id)
            .iter()
            .filter_map(|id| self.data.tasks.get(id))
            .collect()
    }

    /// Tasks `task_id` waits for; dangling edges are skipped
    pub fn wait_tasks(&self, task_id: &str) -> Result<Vec<&Task>> {
        Ok(self
            .task(task_id)?
            .wait_task_ids()
            .iter()
            .filter_map(|id| self.data.tasks.get(id))
            .collect())
    }

    // Change status

    /// Aggregate status of a change
    pub fn change_status(&self, change_id: &str) -> Result<TaskStatus> {
        let present: HashSet<TaskStatus> = self
            .change_tasks(change_id)?
            .iter()
            .map(|t| t.status())
            .collect();
        Ok(status_groups::CHANGE_STATUS_PRIORITY
            .iter()
            .copied()
            .find(|status| present.contains(status))
            .unwrap_or(TaskStatus::Hold))
    }

    /// A change is ready once every task stopped running in either direction
    pub fn change_is_ready(&self, change_id: &str) -> Result<bool> {
        Ok(self
            .change_tasks(change_id)?
            .iter()
            .all(|t| t.status().is_ready()))
    }

    /// Describe the failed tasks of a change in `Error`, first failure first
    pub fn change_err(&self, change_id: &str) -> Result<Option<String>> {
        if self.change_status(change_id)? != TaskStatus::Error {
            return Ok(None);
        }
        let mut failed: Vec<&Task> = self
            .change_tasks(change_id)?
            .into_iter()
            .filter(|t| t.status() == TaskStatus::Error)
            .collect();
        failed.sort_by_key(|t| t.ready_time());

        let mut message = String::from("cannot perform the following tasks:");
        for task in failed {
            message.push_str(&format!(
                "\n- {} ({})",
                task.summary(),
                task.last_error().unwrap_or("unknown error")
            ));
        }
        Ok(Some(message))
    }

    /// Start the reverse cascade of a change
    ///
    /// Applies the abort event to every task that defines it and returns the
    /// IDs of the tasks moved to `Abort`, whose handlers should be stopped.
    pub fn abort_change(&mut self, change_id: &str) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        let mut aborted = Vec::new();
        for task in self.change_tasks(change_id)? {
            match determine_target_state(task.status(), task.waited_status(), &TaskEvent::Abort) {
                Ok(_) => pending.push(task.id().to_string()),
                Err(_) if task.status() == TaskStatus::Abort => aborted.push(task.id().to_string()),
                Err(_) => {}
            }
        }
        for id in pending {
            let task = self.task_mut(&id)?;
            let before = task.status();
            let after = task.apply(&TaskEvent::Abort)?;
            debug!(task_id = %id, from = %before, to = %after, "Task aborted");
            if after == TaskStatus::Abort {
                aborted.push(id);
            }
        }
        Ok(aborted)
    }

    /// Stamp or clear the change's ready time to match its tasks
    pub fn refresh_change_ready_time(&mut self, change_id: &str) -> Result<()> {
        let ready = self.change_is_ready(change_id)?;
        let change = self.change(change_id)?;
        match (ready, change.ready_time().is_some()) {
            (true, false) => {
                let kind = change.kind().to_string();
                let status = self.change_status(change_id)?;
                log_change_operation("ready", change_id, Some(&kind), &status.to_string(), None);
                self.change_mut(change_id)?.set_ready_time(Some(Utc::now()));
            }
            (false, true) => self.change_mut(change_id)?.set_ready_time(None),
            _ => {}
        }
        Ok(())
    }
}
