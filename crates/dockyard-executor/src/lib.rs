//! Command runners for dockyard.
//!
//! Provides `CommandRunner` implementations:
//! - `ProcessRunner` spawns real child processes
//! - `RecordingRunner` records commands without running them (dry runs)

pub mod process;
pub mod recording;

pub use dockyard_core::command::{CommandOutput, CommandRunner, CommandSpec, OutputMode};
pub use process::ProcessRunner;
pub use recording::RecordingRunner;
