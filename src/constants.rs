//! # System Constants
//!
//! Well-known state keys, task/change data keys and status groupings shared by
//! the state store, the task runner and the restart coordinator.

pub use crate::state_machine::TaskStatus;

/// Keys stored in the process-wide keyed data of the state
pub mod state_keys {
    /// Boot id recorded when a system restart was requested
    pub const SYSTEM_RESTART_FROM_BOOT_ID: &str = "system-restart-from-boot-id";
}

/// Keys stored in a change's custom data
pub mod change_keys {
    /// Set while the change waits for a requested system restart
    pub const WAIT_FOR_SYSTEM_RESTART: &str = "wait-for-system-restart";
    /// Boot id the change's restart was requested from
    pub const SYSTEM_RESTART_FROM_BOOT_ID: &str = "system-restart-from-boot-id";
    /// Requests the restart be performed right away
    pub const SYSTEM_RESTART_IMMEDIATE: &str = "system-restart-immediate";
    /// Serialized `RestartInfo` for the change
    pub const RESTART_INFO: &str = "restart-info";
    /// Resources the change operates on, checked by the conflict check
    pub const AFFECTED_RESOURCES: &str = "affected-resources";
}

/// Keys stored in a task's custom data
pub mod task_keys {
    /// Boot id a waiting task was suspended from
    pub const WAIT_FOR_SYSTEM_RESTART_FROM_BOOT_ID: &str = "wait-for-system-restart-from-boot-id";
}

/// Status groupings used by readiness and scheduling decisions
pub mod status_groups {
    use super::TaskStatus;

    /// Statuses in which a task will not run anymore
    pub const READY_STATES: &[TaskStatus] = &[
        TaskStatus::Done,
        TaskStatus::Undone,
        TaskStatus::Error,
        TaskStatus::Hold,
    ];

    /// Statuses in which a handler is (or was) executing
    pub const RUNNING_STATES: &[TaskStatus] =
        &[TaskStatus::Doing, TaskStatus::Undoing, TaskStatus::Abort];

    /// Halt-task statuses that let a task start its undo
    pub const UNDO_UNBLOCKING_STATES: &[TaskStatus] = &[
        TaskStatus::Do,
        TaskStatus::Undone,
        TaskStatus::Hold,
        TaskStatus::Error,
        TaskStatus::Abort,
    ];

    /// Aggregate change status priority, highest first
    pub const CHANGE_STATUS_PRIORITY: &[TaskStatus] = &[
        TaskStatus::Abort,
        TaskStatus::Undoing,
        TaskStatus::Undo,
        TaskStatus::Doing,
        TaskStatus::Do,
        TaskStatus::Wait,
        TaskStatus::Error,
        TaskStatus::Undone,
        TaskStatus::Done,
        TaskStatus::Hold,
    ];
}

/// Messages recorded on tasks by the restart coordinator
pub mod restart_messages {
    pub const CLASSIC_UNDO_SKIPPED: &str =
        "Skipped automatic system restart on classic system when undoing changes back to previous state";
    pub const POSTPONE_REASON: &str = "Postponing reboot as long as there are tasks to run";
    pub const RESTART_COMPLETED: &str = "System restart completed, continuing";
}

/// Environment passed to the operator reboot notifier
pub mod notifier_env {
    pub const PACKAGE: &str = "DPKG_MAINTSCRIPT_PACKAGE";
    pub const PHASE: &str = "DPKG_MAINTSCRIPT_NAME";
    pub const DEFAULT_PHASE: &str = "postinst";
}

/// Maximum log lines retained on a task
pub const MAX_TASK_LOG_ENTRIES: usize = 10;

/// Default boot id source on Linux hosts
pub const DEFAULT_BOOT_ID_PATH: &str = "/proc/sys/kernel/random/boot_id";
