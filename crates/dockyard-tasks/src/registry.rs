//! Static task table.

use std::collections::BTreeMap;

use crate::catalog;
use crate::error::{Result, TaskError};
use crate::task::{Task, TaskId, normalize};

/// Tasks keyed by their normalized id.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Task>,
}

impl TaskRegistry {
    /// The built-in catalogue.
    pub fn builtin() -> Self {
        Self::from_tasks(catalog::builtin())
    }

    /// Later tasks with the same normalized id replace earlier ones.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .map(|task| (task.id.normalized(), task))
                .collect(),
        }
    }

    /// Look up a task, ignoring case, `-` and `_`.
    pub fn resolve(&self, name: &str) -> Result<&Task> {
        let id: TaskId = name.parse()?;
        let key = id.normalized();
        self.tasks.get(&key).ok_or_else(|| TaskError::Unknown {
            name: name.to_string(),
            suggestions: self.suggestions(&key),
        })
    }

    fn suggestions(&self, key: &str) -> Vec<String> {
        let bare = key.rsplit(':').next().unwrap_or(key);
        self.tasks
            .iter()
            .filter(|(candidate, _)| {
                candidate.rsplit(':').next() == Some(bare) || candidate.starts_with(key)
            })
            .map(|(_, task)| task.id.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks grouped by namespace; root tasks under `None`, which sorts first.
    pub fn by_namespace(&self) -> BTreeMap<Option<&str>, Vec<&Task>> {
        let mut groups: BTreeMap<Option<&str>, Vec<&Task>> = BTreeMap::new();
        for task in self.tasks.values() {
            groups.entry(task.id.namespace()).or_default().push(task);
        }
        groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }
}
