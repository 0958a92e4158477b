//! Dry-run runner.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use dockyard_core::cancel::CancelSignal;
use dockyard_core::command::{CommandOutput, CommandRunner, CommandSpec};
use dockyard_core::error::ExecError;

/// Records every command instead of running it.
///
/// Listings answer with empty output unless a canned response is registered,
/// so a dry run shows the full plan for a fresh machine.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    responses: Vec<(String, String)>,
    failures: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose rendered line starts with `prefix` with `stdout`.
    /// The first registered match wins.
    pub fn with_response(mut self, prefix: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.push((prefix.into(), stdout.into()));
        self
    }

    /// Fail commands whose rendered line starts with `prefix` with exit status 1.
    pub fn failing_on(mut self, prefix: impl Into<String>) -> Self {
        self.failures.push(prefix.into());
        self
    }

    /// Commands issued so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.lock().clone()
    }

    /// Rendered, secret-masked lines of the commands issued so far.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(CommandSpec::display_line).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CommandSpec>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, ExecError> {
        let line = spec.display_line();
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled { command: line });
        }

        info!(command = %line, "dry run");
        self.lock().push(spec.clone());

        if self.failures.iter().any(|prefix| line.starts_with(prefix)) {
            return Err(ExecError::Exit {
                command: line,
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }

        let stdout = self
            .responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }
}
