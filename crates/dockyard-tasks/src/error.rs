//! Task errors.

use thiserror::Error;

use dockyard_core::{PipelineFailure, RunId};

use crate::task::TaskId;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid task id '{0}': expected name or namespace:name")]
    InvalidId(String),

    #[error("unknown task '{name}'{}", describe_suggestions(.suggestions))]
    Unknown {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("task {task} failed at {failure}")]
    Failed {
        task: TaskId,
        run_id: RunId,
        failure: PipelineFailure,
    },
}

impl TaskError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Failed { failure, .. } if failure.is_cancelled())
    }
}

fn describe_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
