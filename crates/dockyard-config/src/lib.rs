//! Settings for dockyard.
//!
//! This crate handles:
//! - Built-in defaults for every setting
//! - Loading `dockyard.kdl` and `--set KEY=VALUE` overrides
//! - Discovering the git commit once per run
//! - `${KEY}` interpolation and secret masking

pub mod error;
pub mod file;
pub mod settings;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use file::DEFAULT_FILE;
pub use settings::{GIT_COMMIT, Settings, SettingsBuilder, discover_git_commit};
