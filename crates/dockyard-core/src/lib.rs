//! Core orchestration engine for dockyard.
//!
//! This crate contains:
//! - The command model and the `CommandRunner` trait
//! - Resource descriptors, existence probing and idempotent provisioning
//! - Host platform resolution for compose invocations
//! - Fail-fast step pipelines with scoped working directories
//! - Run identifiers and cooperative cancellation

pub mod cancel;
pub mod command;
pub mod error;
pub mod id;
pub mod invoke;
pub mod pipeline;
pub mod platform;
pub mod probe;
pub mod provision;
pub mod resource;
pub mod workdir;

#[cfg(test)]
mod fake;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use command::{CommandOutput, CommandRunner, CommandSpec, EnvOverlay, OutputMode};
pub use error::{Error, ExecError, Result};
pub use id::RunId;
pub use pipeline::{
    Pipeline, PipelineFailure, PipelineObserver, PipelineState, Step, StepAction, StepContext,
    StepOutcome,
};
pub use platform::{ComposeAction, Platform};
pub use probe::ProbeStrategy;
pub use resource::{ProvisionOutcome, ResourceDescriptor, ResourceKind};
