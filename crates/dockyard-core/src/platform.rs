//! Host platform detection and per-platform command variants.

use derive_more::Display;
use serde::Serialize;

use crate::error::{Error, Result};

/// Host operating system, as far as command syntax is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[display("windows")]
    Windows,
    #[display("darwin")]
    Darwin,
    #[display("linux")]
    Linux,
    #[display("{_0}")]
    Other(String),
}

impl Platform {
    /// Map an OS identifier (`std::env::consts::OS` or a GOOS-style name).
    pub fn from_os(os: &str) -> Self {
        match os.trim().to_ascii_lowercase().as_str() {
            "windows" => Platform::Windows,
            "macos" | "darwin" => Platform::Darwin,
            "linux" => Platform::Linux,
            other => Platform::Other(other.to_string()),
        }
    }

    /// The platform this binary was compiled for.
    pub fn host() -> Self {
        Self::from_os(std::env::consts::OS)
    }
}

/// Multi-container stack operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeAction {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
}

impl ComposeAction {
    fn args(self) -> &'static [&'static str] {
        match self {
            ComposeAction::Up => &["up", "-d"],
            ComposeAction::Down => &["down"],
        }
    }
}

/// Syntactic shape of the compose tool on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandVariant {
    /// `docker compose ...`
    #[display("docker compose")]
    ComposePlugin,
    /// `docker-compose ...`
    #[display("docker-compose")]
    StandaloneCompose,
}

impl CommandVariant {
    /// Program and arguments for `action`.
    pub fn invocation(self, action: ComposeAction) -> (String, Vec<String>) {
        let tail = action.args().iter().map(|a| a.to_string());
        match self {
            CommandVariant::ComposePlugin => (
                "docker".to_string(),
                std::iter::once("compose".to_string()).chain(tail).collect(),
            ),
            CommandVariant::StandaloneCompose => ("docker-compose".to_string(), tail.collect()),
        }
    }
}

/// Resolve the compose variant for `platform`. Pure.
pub fn resolve(platform: &Platform) -> Result<CommandVariant> {
    match platform {
        Platform::Windows | Platform::Darwin => Ok(CommandVariant::ComposePlugin),
        Platform::Linux => Ok(CommandVariant::StandaloneCompose),
        Platform::Other(os) => Err(Error::UnsupportedPlatform(os.clone())),
    }
}
