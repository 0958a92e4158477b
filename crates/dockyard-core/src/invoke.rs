//! Runner plus the per-run environment and cancel signal.

use tracing::debug;

use crate::cancel::CancelSignal;
use crate::command::{CommandOutput, CommandRunner, CommandSpec, EnvOverlay};
use crate::error::ExecError;

/// Everything needed to issue a command on behalf of a step.
#[derive(Clone, Copy)]
pub struct Invoker<'a> {
    runner: &'a dyn CommandRunner,
    env: &'a EnvOverlay,
    cancel: &'a CancelSignal,
}

impl<'a> Invoker<'a> {
    pub fn new(runner: &'a dyn CommandRunner, env: &'a EnvOverlay, cancel: &'a CancelSignal) -> Self {
        Self {
            runner,
            env,
            cancel,
        }
    }

    /// Run `spec` with the shared environment beneath its own overlay.
    pub async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        let env = spec.env.merged_over(self.env);
        let spec = spec.with_env(env);
        debug!(runner = self.runner.name(), command = %spec, "running command");
        self.runner.run(&spec, self.cancel).await
    }
}
