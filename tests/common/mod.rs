#![allow(dead_code)]

pub mod builders;
pub mod strategies;

pub use builders::*;

use parking_lot::Mutex;
use steward_core::error::Result;
use steward_core::restart::{RebootInfo, RestartHandler, RestartType};
use steward_core::state::StateGuard;

/// Restart handler double recording every call it receives
#[derive(Default)]
pub struct RecordingRestartHandler {
    pub restarts: Mutex<Vec<(RestartType, Option<RebootInfo>)>>,
    pub rebooted_as_expected: Mutex<usize>,
    pub reboot_did_not_happen: Mutex<usize>,
}

impl RecordingRestartHandler {
    pub fn restart_kinds(&self) -> Vec<RestartType> {
        self.restarts.lock().iter().map(|(kind, _)| *kind).collect()
    }
}

impl RestartHandler for RecordingRestartHandler {
    fn handle_restart(&self, kind: RestartType, reboot_info: Option<&RebootInfo>) {
        self.restarts.lock().push((kind, reboot_info.cloned()));
    }

    fn reboot_as_expected(&self, _st: &mut StateGuard<'_>) -> Result<()> {
        *self.rebooted_as_expected.lock() += 1;
        Ok(())
    }

    fn reboot_did_not_happen(&self, _st: &mut StateGuard<'_>) -> Result<()> {
        *self.reboot_did_not_happen.lock() += 1;
        Ok(())
    }
}
