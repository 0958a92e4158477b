//! Error types for dockyard.

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::ResourceKind;

/// Failure of a single external command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn describe_path(path: &std::path::Path) -> String {
    path.display().to_string()
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("existence of {kind} '{name}' is advisory: {reason}")]
    ProbeAmbiguous {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("working directory error at {}: {source}", describe_path(.path))]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
