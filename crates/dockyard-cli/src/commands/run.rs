//! `dockyard run <task>`.

use anyhow::Result;
use tracing::warn;

use dockyard_config::Settings;
use dockyard_core::{CancelSignal, PipelineObserver, ProbeStrategy, cancel_pair};
use dockyard_executor::{ProcessRunner, RecordingRunner};
use dockyard_tasks::{Dispatcher, TaskReport, TaskRegistry};

use crate::GlobalArgs;
use crate::progress::ProgressPrinter;

pub async fn run(global: &GlobalArgs, name: &str) -> Result<()> {
    let registry = TaskRegistry::builtin();
    // Fail on a typo before touching git or the settings file.
    let task = registry.resolve(name)?.id.clone();
    let settings = super::load_settings(global)?;

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            handle.cancel();
        }
    });

    let progress = ProgressPrinter;
    let report = if global.dry_run {
        let (plan, result) = dry_run(
            &registry,
            &settings,
            &cancel,
            global.probe.into(),
            &progress,
            name,
        )
        .await;
        println!("dry run of {}: {} commands", task, plan.len());
        for line in &plan {
            println!("  {}", line);
        }
        result?
    } else {
        let runner = ProcessRunner::new();
        let report = Dispatcher::new(&registry, &settings, &runner, &cancel)
            .with_probe_strategy(global.probe.into())
            .with_observer(&progress)
            .run(name)
            .await?;
        if let Some(message) = report.success_message {
            println!("{}", message);
        }
        report
    };

    eprintln!("{} finished (run {})", report.task, report.run_id);
    Ok(())
}

/// Record the commands of `name` without running them. The plan recorded
/// so far is returned even when the task stops early.
async fn dry_run(
    registry: &TaskRegistry,
    settings: &Settings,
    cancel: &CancelSignal,
    probe: ProbeStrategy,
    observer: &dyn PipelineObserver,
    name: &str,
) -> (Vec<String>, dockyard_tasks::Result<TaskReport>) {
    let recorder = RecordingRunner::new();
    let result = Dispatcher::new(registry, settings, &recorder, cancel)
        .with_probe_strategy(probe)
        .with_observer(observer)
        .run(name)
        .await;
    (recorder.lines(), result)
}
