//! Child process runner.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use dockyard_core::cancel::CancelSignal;
use dockyard_core::command::{CommandOutput, CommandRunner, CommandSpec, OutputMode};
use dockyard_core::error::ExecError;

/// Runs commands as child processes of dockyard.
///
/// The child inherits the process environment and working directory, with
/// the command's overlay layered on top. Output is either streamed to the
/// terminal or captured, depending on [`OutputMode`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter())
            .kill_on_drop(true);

        match spec.output {
            OutputMode::Stream => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }
        cmd
    }
}

type Collected = (std::io::Result<ExitStatus>, String, String);

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        warn!(error = %e, "failed reading child output");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(child: &mut Child) -> Collected {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::join!(read_all(stdout), read_all(stderr));
    let status = child.wait().await;
    (status, stdout, stderr)
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, ExecError> {
        let line = spec.display_line();
        info!(command = %line, "executing");

        let mut child = Self::command(spec).spawn().map_err(|source| ExecError::Spawn {
            command: line.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), "spawned child");

        let collected = {
            let finished = collect(&mut child);
            tokio::select! {
                collected = finished => Some(collected),
                _ = cancel.cancelled() => None,
            }
        };

        let Some((status, stdout, stderr)) = collected else {
            if let Err(e) = child.kill().await {
                warn!(command = %line, error = %e, "failed to kill cancelled child");
            }
            return Err(ExecError::Cancelled { command: line });
        };

        let status = status.map_err(|source| ExecError::Spawn {
            command: line.clone(),
            source,
        })?;

        if !status.success() {
            return Err(ExecError::Exit {
                command: line,
                code: status.code(),
                stderr: spec.env.redact(stderr.trim()),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
