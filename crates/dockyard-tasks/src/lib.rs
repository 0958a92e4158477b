//! Tasks for dockyard.
//!
//! Maps task names such as `configure` or `docker:build-server` to
//! pipelines and runs them, one task per invocation.

pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod task;

pub use dispatch::{Dispatcher, TaskReport};
pub use error::{Result, TaskError};
pub use registry::TaskRegistry;
pub use task::{Task, TaskId};
