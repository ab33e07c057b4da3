use crate::state_machine::TaskStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of restart a task can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartType {
    #[default]
    Unset,
    /// Restart the service process only
    Daemon,
    /// Reboot the host once nothing else can run
    System,
    /// Reboot the host right away
    SystemNow,
    SystemHaltNow,
    SystemPoweroffNow,
    /// Restart the service through its socket activation
    Socket,
}

impl RestartType {
    /// The "right away" variant used when a change demands an immediate restart
    pub fn immediate(self) -> Self {
        match self {
            Self::System => Self::SystemNow,
            other => other,
        }
    }

    /// Restarts that reboot the host and therefore change the boot id
    pub fn is_system(self) -> bool {
        matches!(
            self,
            Self::System | Self::SystemNow | Self::SystemHaltNow | Self::SystemPoweroffNow
        )
    }
}

impl fmt::Display for RestartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unset => "unset",
            Self::Daemon => "daemon",
            Self::System => "system",
            Self::SystemNow => "system-now",
            Self::SystemHaltNow => "system-halt-now",
            Self::SystemPoweroffNow => "system-poweroff-now",
            Self::Socket => "socket",
        };
        f.write_str(name)
    }
}

/// Metadata handed to the reboot handler, opaque to the coordinator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebootInfo {
    #[serde(default)]
    pub reboot_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootloader_hint: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// A task suspended until the restart happened, and the status it gets afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartWaiter {
    pub task_id: String,
    pub status: TaskStatus,
}

/// Per-change restart bookkeeping, stored in the change data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestartInfo {
    #[serde(default)]
    pub restart_type: RestartType,
    #[serde(default)]
    pub requesters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot_info: Option<RebootInfo>,
    #[serde(default)]
    pub waiters: Vec<RestartWaiter>,
    #[serde(default)]
    pub requested: bool,
}

impl RestartInfo {
    pub fn add_requester(&mut self, requester: &str) {
        if !self.requesters.iter().any(|r| r == requester) {
            self.requesters.push(requester.to_string());
        }
    }

    /// Record a waiter, replacing an earlier entry for the same task
    pub fn add_waiter(&mut self, task_id: &str, status: TaskStatus) {
        self.waiters.retain(|w| w.task_id != task_id);
        self.waiters.push(RestartWaiter {
            task_id: task_id.to_string(),
            status,
        });
    }

    pub fn remove_waiter(&mut self, task_id: &str) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|w| w.task_id != task_id);
        self.waiters.len() != before
    }

    /// Keep the strongest restart kind asked for by any requester
    pub fn merge_type(&mut self, kind: RestartType) {
        let rank = |k: RestartType| match k {
            RestartType::Unset => 0,
            RestartType::Daemon | RestartType::Socket => 1,
            RestartType::System => 2,
            RestartType::SystemNow => 3,
            RestartType::SystemHaltNow | RestartType::SystemPoweroffNow => 4,
        };
        if rank(kind) > rank(self.restart_type) {
            self.restart_type = kind;
        }
    }
}
