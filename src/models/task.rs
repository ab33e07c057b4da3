//! # Task Model
//!
//! A task is the atomic, schedulable unit of work inside a change.
//!
//! ## Overview
//!
//! Each task carries a kind (used to look up its handlers), a human summary, a
//! status, custom data, a short log of human-readable messages, the IDs of the
//! tasks it waits for, and the lanes it belongs to. Tasks are never deleted.
//!
//! Halt tasks (the tasks waiting on this one) are not stored: they are derived by
//! the state from the wait edges of every other task.
//!
//! ## Status Rules
//!
//! - `set_status` never accepts `Wait`; `set_to_wait` is the only way in and it
//!   always records the waited status adopted once the wait clears.
//! - `apply` routes an event through the transition table in
//!   [`crate::state_machine::determine_target_state`].
//! - The log keeps only the most recent [`MAX_TASK_LOG_ENTRIES`] lines.

use crate::constants::MAX_TASK_LOG_ENTRIES;
use crate::error::Result;
use crate::models::CustomData;
use crate::state_machine::{determine_target_state, StateMachineError, TaskEvent, TaskStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Lane assumed for tasks that never joined one
pub const DEFAULT_LANE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    kind: String,
    summary: String,
    #[serde(default)]
    status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    waited_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "CustomData::is_empty")]
    data: CustomData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    log: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    wait_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    lanes: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    change: Option<String>,
    spawn_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ready_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    at_time: Option<DateTime<Utc>>,
}

impl Task {
    pub(crate) fn new(id: String, kind: &str, summary: &str) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            summary: summary.to_string(),
            status: TaskStatus::Do,
            waited_status: None,
            data: CustomData::default(),
            log: Vec::new(),
            wait_tasks: Vec::new(),
            lanes: Vec::new(),
            change: None,
            spawn_time: Utc::now(),
            ready_time: None,
            at_time: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Status adopted once a `Wait` clears
    pub fn waited_status(&self) -> Option<TaskStatus> {
        self.waited_status
    }

    /// ID of the change this task belongs to, if added to one
    pub fn change_id(&self) -> Option<&str> {
        self.change.as_deref()
    }

    pub(crate) fn set_change(&mut self, change_id: &str) {
        self.change = Some(change_id.to_string());
    }

    /// Set a non-wait status, clearing any waited status
    pub fn set_status(&mut self, status: TaskStatus) -> Result<()> {
        if status == TaskStatus::Wait {
            return Err(StateMachineError::WaitWithoutWaitedStatus.into());
        }
        self.status = status;
        self.waited_status = None;
        self.ready_time = status.is_ready().then(Utc::now);
        Ok(())
    }

    /// Put the task in `Wait`, adopting `waited` once the wait clears
    pub fn set_to_wait(&mut self, waited: TaskStatus) -> Result<()> {
        if !waited.is_valid_waited() {
            return Err(StateMachineError::InvalidWaitedStatus(waited.to_string()).into());
        }
        self.status = TaskStatus::Wait;
        self.waited_status = Some(waited);
        self.ready_time = None;
        Ok(())
    }

    /// Apply an event through the transition table, returning the new status
    pub fn apply(&mut self, event: &TaskEvent) -> Result<TaskStatus> {
        let transition = determine_target_state(self.status, self.waited_status, event)?;
        match transition.waited {
            Some(waited) => self.set_to_wait(waited)?,
            None => self.set_status(transition.status)?,
        }
        Ok(self.status)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.data.get(key)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.data.set(key, value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.has(key)
    }

    pub fn clear(&mut self, key: &str) -> bool {
        self.data.remove(key)
    }

    /// IDs of the tasks that must be done before this one runs
    pub fn wait_task_ids(&self) -> &[String] {
        &self.wait_tasks
    }

    pub(crate) fn add_wait_task(&mut self, task_id: &str) {
        if !self.wait_tasks.iter().any(|id| id == task_id) {
            self.wait_tasks.push(task_id.to_string());
        }
    }

    /// Lanes the task belongs to; tasks outside any lane share the default lane
    pub fn lanes(&self) -> Vec<u32> {
        if self.lanes.is_empty() {
            vec![DEFAULT_LANE]
        } else {
            self.lanes.clone()
        }
    }

    pub fn join_lane(&mut self, lane: u32) {
        if !self.lanes.contains(&lane) {
            self.lanes.push(lane);
        }
    }

    /// Check whether this task shares at least one lane with `other`
    pub fn shares_lane_with(&self, other: &Task) -> bool {
        let theirs = other.lanes();
        self.lanes().iter().any(|lane| theirs.contains(lane))
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Append an informational message to the task log
    pub fn logf(&mut self, message: impl AsRef<str>) {
        self.add_log("INFO", message.as_ref());
    }

    /// Append an error message to the task log
    pub fn errorf(&mut self, message: impl AsRef<str>) {
        self.add_log("ERROR", message.as_ref());
    }

    fn add_log(&mut self, level: &str, message: &str) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.log.push(format!("{stamp} {level} {message}"));
        if self.log.len() > MAX_TASK_LOG_ENTRIES {
            let excess = self.log.len() - MAX_TASK_LOG_ENTRIES;
            self.log.drain(..excess);
        }
    }

    /// Most recent error message in the log, without its prefix
    pub fn last_error(&self) -> Option<&str> {
        self.log.iter().rev().find_map(|line| {
            line.split_once(" ERROR ").map(|(_, message)| message)
        })
    }

    pub fn spawn_time(&self) -> DateTime<Utc> {
        self.spawn_time
    }

    pub fn ready_time(&self) -> Option<DateTime<Utc>> {
        self.ready_time
    }

    /// Earliest time the task may run again, if postponed
    pub fn at_time(&self) -> Option<DateTime<Utc>> {
        self.at_time
    }

    pub fn set_at_time(&mut self, at: Option<DateTime<Utc>>) {
        self.at_time = at;
    }
}
