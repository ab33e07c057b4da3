use crate::error::{Result, StewardError};
use crate::state::StateGuard;

/// Fail if an unready change other than `ignoring` already operates on one of `resources`
pub fn check_change_conflict(
    st: &StateGuard<'_>,
    resources: &[&str],
    ignoring: Option<&str>,
) -> Result<()> {
    for change in st.changes() {
        if Some(change.id()) == ignoring || st.change_is_ready(change.id())? {
            continue;
        }
        let affected = change.affected_resources();
        if let Some(resource) = resources.iter().find(|r| affected.iter().any(|a| a == *r)) {
            return Err(StewardError::ChangeConflict {
                resource: resource.to_string(),
                change_kind: change.kind().to_string(),
                change_id: change.id().to_string(),
            });
        }
    }
    Ok(())
}
