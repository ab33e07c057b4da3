use crate::error::Result;
use crate::state::StateGuard;

/// Ordered group of task IDs wired together as a unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSet {
    task_ids: Vec<String>,
}

impl TaskSet {
    pub fn new<I, S>(task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for id in task_ids {
            set.add_task(id);
        }
        set
    }

    pub fn task_ids(&self) -> &[String] {
        &self.task_ids
    }

    pub fn add_task(&mut self, task_id: impl Into<String>) {
        let task_id = task_id.into();
        if !self.task_ids.contains(&task_id) {
            self.task_ids.push(task_id);
        }
    }

    pub fn add_all(&mut self, other: &TaskSet) {
        for id in &other.task_ids {
            self.add_task(id.clone());
        }
    }

    /// Make every task of this set wait for `task_id`
    pub fn wait_for(&self, st: &mut StateGuard<'_>, task_id: &str) -> Result<()> {
        for id in &self.task_ids {
            st.task_wait_for(id, task_id)?;
        }
        Ok(())
    }

    /// Make every task of this set wait for every task of `other`
    pub fn wait_all(&self, st: &mut StateGuard<'_>, other: &TaskSet) -> Result<()> {
        for prerequisite in &other.task_ids {
            self.wait_for(st, prerequisite)?;
        }
        Ok(())
    }

    pub fn join_lane(&self, st: &mut StateGuard<'_>, lane: u32) -> Result<()> {
        for id in &self.task_ids {
            st.task_mut(id)?.join_lane(lane);
        }
        Ok(())
    }

    /// Add every task of this set to a change
    pub fn add_to_change(&self, st: &mut StateGuard<'_>, change_id: &str) -> Result<()> {
        for id in &self.task_ids {
            st.add_task(change_id, id)?;
        }
        Ok(())
    }
}
