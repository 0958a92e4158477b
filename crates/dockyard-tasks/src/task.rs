//! Task identifiers and definitions.

use std::fmt;
use std::str::FromStr;

use dockyard_config::Settings;
use dockyard_core::Pipeline;

use crate::TaskError;

/// `namespace:name`, or a bare `name` for root tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    namespace: Option<String>,
    name: String,
}

impl TaskId {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn root(name: &str) -> Self {
        Self::new(None, name)
    }

    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self::new(Some(namespace), name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookup key: lower case with `-` and `_` removed, so `buildServer`,
    /// `build-server` and `BUILD_SERVER` all match.
    pub fn normalized(&self) -> String {
        normalize(&self.to_string())
    }
}

pub(crate) fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}:{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for TaskId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (namespace, name) = match s.split_once(':') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, s),
        };
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        if !valid(name) || !namespace.is_none_or(valid) {
            return Err(TaskError::InvalidId(s.to_string()));
        }
        Ok(Self::new(namespace, name))
    }
}

/// A named entry point that expands into a pipeline.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub summary: &'static str,
    /// Printed after the task succeeds.
    pub success_message: Option<&'static str>,
    build: fn(&Settings) -> Pipeline,
}

impl Task {
    pub fn new(id: TaskId, summary: &'static str, build: fn(&Settings) -> Pipeline) -> Self {
        Self {
            id,
            summary,
            success_message: None,
            build,
        }
    }

    pub fn with_success_message(mut self, message: &'static str) -> Self {
        self.success_message = Some(message);
        self
    }

    /// The task's steps with settings substituted.
    pub fn pipeline(&self, settings: &Settings) -> Pipeline {
        (self.build)(settings)
    }
}
