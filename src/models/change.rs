//! # Change Model
//!
//! A change groups the tasks of one logical operation (an install, a refresh, a
//! removal). Its status is never stored: the state derives it from its tasks.

use crate::constants::change_keys;
use crate::error::Result;
use crate::models::CustomData;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    id: String,
    kind: String,
    summary: String,
    #[serde(default, skip_serializing_if = "CustomData::is_empty")]
    data: CustomData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    task_ids: Vec<String>,
    spawn_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ready_time: Option<DateTime<Utc>>,
}

impl Change {
    pub(crate) fn new(id: String, kind: &str, summary: &str) -> Self {
        Self {
            id,
            kind: kind.to_string(),
            summary: summary.to_string(),
            data: CustomData::default(),
            task_ids: Vec::new(),
            spawn_time: Utc::now(),
            ready_time: None,
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

    /// Task IDs in the order they were added
    pub fn task_ids(&self) -> &[String] {
        &self.task_ids
    }

    pub(crate) fn add_task_id(&mut self, task_id: &str) {
        if !self.task_ids.iter().any(|id| id == task_id) {
            self.task_ids.push(task_id.to_string());
        }
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

    /// Declare the resources this change operates on, for conflict checks
    pub fn set_affected_resources(&mut self, resources: &[&str]) -> Result<()> {
        self.data.set(change_keys::AFFECTED_RESOURCES, resources)
    }

    pub fn affected_resources(&self) -> Vec<String> {
        self.data
            .get(change_keys::AFFECTED_RESOURCES)
            .unwrap_or_default()
    }

    pub fn spawn_time(&self) -> DateTime<Utc> {
        self.spawn_time
    }

    pub fn ready_time(&self) -> Option<DateTime<Utc>> {
        self.ready_time
    }

    pub(crate) fn set_ready_time(&mut self, at: Option<DateTime<Utc>>) {
        self.ready_time = at;
    }
}
