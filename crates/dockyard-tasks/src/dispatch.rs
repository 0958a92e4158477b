//! Running a task by name.

use tracing::{Instrument, error, info, info_span};

use dockyard_config::Settings;
use dockyard_core::{
    CancelSignal, CommandRunner, PipelineObserver, ProbeStrategy, RunId, StepContext,
};

use crate::error::{Result, TaskError};
use crate::registry::TaskRegistry;
use crate::task::TaskId;

/// Outcome of a successful task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskId,
    pub run_id: RunId,
    pub success_message: Option<&'static str>,
}

/// Resolves task names and runs their pipelines against one runner.
pub struct Dispatcher<'a> {
    registry: &'a TaskRegistry,
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    cancel: &'a CancelSignal,
    host_os: String,
    probe: ProbeStrategy,
    observer: Option<&'a dyn PipelineObserver>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a TaskRegistry,
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        cancel: &'a CancelSignal,
    ) -> Self {
        Self {
            registry,
            settings,
            runner,
            cancel,
            host_os: std::env::consts::OS.to_string(),
            probe: ProbeStrategy::default(),
            observer: None,
        }
    }

    pub fn with_host_os(mut self, os: impl Into<String>) -> Self {
        self.host_os = os.into();
        self
    }

    pub fn with_probe_strategy(mut self, probe: ProbeStrategy) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn PipelineObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the named task to completion or first failure.
    pub async fn run(&self, name: &str) -> Result<TaskReport> {
        let task = self.registry.resolve(name)?;
        let run_id = RunId::new();
        let span = info_span!("task", task = %task.id, run_id = %run_id);

        async {
            let pipeline = task.pipeline(self.settings);
            let env = self.settings.env_overlay();
            let mut ctx = StepContext::new(self.runner, &env, self.cancel)
                .with_host_os(self.host_os.clone())
                .with_probe_strategy(self.probe);
            if let Some(observer) = self.observer {
                ctx = ctx.with_observer(observer);
            }

            info!(
                steps = pipeline.len(),
                runner = self.runner.name(),
                probe = %self.probe,
                "starting task"
            );

            match pipeline.run(&ctx).await {
                Ok(()) => {
                    info!("task succeeded");
                    Ok(TaskReport {
                        task: task.id.clone(),
                        run_id,
                        success_message: task.success_message,
                    })
                }
                Err(failure) => {
                    error!(error = %failure, "task failed");
                    Err(TaskError::Failed {
                        task: task.id.clone(),
                        run_id,
                        failure,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }
}
