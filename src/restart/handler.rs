use super::types::{RebootInfo, RestartType};
use crate::error::Result;
use crate::state::StateGuard;

/// Host integration performing restarts on behalf of the coordinator
///
/// `reboot_as_expected` and `reboot_did_not_happen` run during start up with the
/// state lock held.
pub trait RestartHandler: Send + Sync {
    fn handle_restart(&self, kind: RestartType, reboot_info: Option<&RebootInfo>);

    /// Called at start up when the boot id shows a reboot happened (or none was expected)
    fn reboot_as_expected(&self, _st: &mut StateGuard<'_>) -> Result<()> {
        Ok(())
    }

    /// Called at start up when a requested reboot did not happen
    fn reboot_did_not_happen(&self, _st: &mut StateGuard<'_>) -> Result<()> {
        Ok(())
    }
}
