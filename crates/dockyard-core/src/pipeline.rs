//! Ordered, fail-fast step pipelines.
//!
//! A [`Pipeline`] runs its [`Step`]s strictly in order on the calling task.
//! The first failing step stops the pipeline; the failure travels back up
//! with the label of every enclosing step prepended, so the caller sees the
//! full path to the step that broke. Nothing is rolled back.

use async_recursion::async_recursion;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::command::{CommandRunner, CommandSpec, EnvOverlay};
use crate::error::Error;
use crate::invoke::Invoker;
use crate::platform::{self, ComposeAction, Platform};
use crate::probe::ProbeStrategy;
use crate::provision::Provisioner;
use crate::resource::{ProvisionOutcome, ResourceDescriptor};
use crate::workdir::WorkdirGuard;

/// What a step does.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Invoke one external command.
    Command(CommandSpec),
    /// Probe for a resource and create or start it as needed.
    Ensure(ResourceDescriptor),
    /// Probe a network's members and connect the container if missing.
    Attach { network: String, container: String },
    /// Bring the compose stack in the current directory up or down, using
    /// the syntax of the host platform.
    Compose(ComposeAction),
    /// Run another pipeline.
    Nested(Pipeline),
    /// Run another pipeline inside `dir`, restoring the working directory
    /// afterwards on every path.
    Scoped { dir: PathBuf, pipeline: Pipeline },
}

#[derive(Debug, Clone)]
pub struct Step {
    /// Shown in progress output and failure chains.
    pub label: String,
    pub action: StepAction,
}

impl Step {
    pub fn new(label: impl Into<String>, action: StepAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }

    pub fn command(label: impl Into<String>, spec: CommandSpec) -> Self {
        Self::new(label, StepAction::Command(spec))
    }

    pub fn ensure(label: impl Into<String>, resource: ResourceDescriptor) -> Self {
        Self::new(label, StepAction::Ensure(resource))
    }

    pub fn attach(
        label: impl Into<String>,
        network: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self::new(
            label,
            StepAction::Attach {
                network: network.into(),
                container: container.into(),
            },
        )
    }

    pub fn compose(label: impl Into<String>, action: ComposeAction) -> Self {
        Self::new(label, StepAction::Compose(action))
    }

    pub fn nested(label: impl Into<String>, pipeline: Pipeline) -> Self {
        Self::new(label, StepAction::Nested(pipeline))
    }

    pub fn scoped(label: impl Into<String>, dir: impl Into<PathBuf>, pipeline: Pipeline) -> Self {
        Self::new(
            label,
            StepAction::Scoped {
                dir: dir.into(),
                pipeline,
            },
        )
    }

    /// Execute this step, wrapping any failure with the step's label.
    #[async_recursion]
    pub async fn run<'a>(&self, ctx: &StepContext<'a>) -> Result<StepOutcome, PipelineFailure> {
        if ctx.cancel.is_cancelled() {
            return Err(PipelineFailure::new(Error::Cancelled).within(&self.label));
        }

        debug!(step = %self.label, "starting step");
        let result = self.execute(ctx).await;

        match &result {
            Ok(outcome) => {
                info!(step = %self.label, %outcome, "step completed");
                ctx.notify_step(&self.label, Some(*outcome));
            }
            Err(_) => ctx.notify_step(&self.label, None),
        }

        result.map_err(|failure| failure.within(&self.label))
    }

    async fn execute<'a>(&self, ctx: &StepContext<'a>) -> Result<StepOutcome, PipelineFailure> {
        match &self.action {
            StepAction::Command(spec) => {
                ctx.invoker().run(spec.clone()).await.map_err(Error::from)?;
                Ok(StepOutcome::Done)
            }
            StepAction::Ensure(resource) => {
                let outcome = ctx
                    .provisioner()
                    .ensure(resource)
                    .await
                    .map_err(Error::from)?;
                Ok(StepOutcome::Provisioned(outcome))
            }
            StepAction::Attach { network, container } => {
                let outcome = ctx
                    .provisioner()
                    .ensure_attached(network, container)
                    .await
                    .map_err(Error::from)?;
                Ok(StepOutcome::Provisioned(outcome))
            }
            StepAction::Compose(action) => {
                let platform = ctx.platform();
                let variant = platform::resolve(&platform)?;
                let (program, args) = variant.invocation(*action);
                debug!(%platform, %variant, %action, "resolved compose invocation");
                ctx.invoker()
                    .run(CommandSpec::new(program, args))
                    .await
                    .map_err(Error::from)?;
                Ok(StepOutcome::Done)
            }
            StepAction::Nested(pipeline) => {
                pipeline.run(ctx).await?;
                Ok(StepOutcome::Done)
            }
            StepAction::Scoped { dir, pipeline } => {
                let guard = WorkdirGuard::enter(dir)?;
                let result = pipeline.run(ctx).await;
                let restored = guard.restore();
                match (result, restored) {
                    (Ok(()), Ok(())) => Ok(StepOutcome::Done),
                    (Ok(()), Err(e)) => Err(e.into()),
                    (Err(failure), Ok(())) => Err(failure),
                    (Err(failure), Err(e)) => {
                        warn!(error = %e, "could not restore working directory after failure");
                        Err(failure)
                    }
                }
            }
        }
    }

    fn render(&self, env: &EnvOverlay, depth: usize, out: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        match &self.action {
            StepAction::Command(spec) => out.push(format!(
                "{}{}: {}",
                indent,
                self.label,
                env.redact(&spec.display_line())
            )),
            StepAction::Ensure(resource) => {
                out.push(format!("{}{}: ensure {}", indent, self.label, resource))
            }
            StepAction::Attach { network, container } => out.push(format!(
                "{}{}: attach '{}' to network '{}'",
                indent, self.label, container, network
            )),
            StepAction::Compose(action) => out.push(format!(
                "{}{}: compose {} (syntax depends on platform)",
                indent, self.label, action
            )),
            StepAction::Nested(pipeline) => {
                out.push(format!("{}{}", indent, self.label));
                pipeline.render_into(env, depth + 1, out);
            }
            StepAction::Scoped { dir, pipeline } => {
                out.push(format!("{}{}: in {}", indent, self.label, dir.display()));
                pipeline.render_into(env, depth + 1, out);
            }
        }
    }
}

/// What a successful step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Provisioned(ProvisionOutcome),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Done => f.write_str("done"),
            StepOutcome::Provisioned(outcome) => write!(f, "{}", outcome),
        }
    }
}

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running { step: usize },
    Succeeded,
    Failed { step: usize },
}

/// The first failure of a pipeline, with the labels of the steps it
/// unwound through, outermost first.
#[derive(Debug, Error)]
#[error("{}: {cause}", render_chain(.chain))]
pub struct PipelineFailure {
    chain: Vec<String>,
    index: Option<usize>,
    cause: Error,
}

fn render_chain(chain: &[String]) -> String {
    if chain.is_empty() {
        return "pipeline".to_string();
    }
    chain
        .iter()
        .map(|label| format!("`{}`", label))
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl PipelineFailure {
    pub fn new(cause: Error) -> Self {
        Self {
            chain: Vec::new(),
            index: None,
            cause,
        }
    }

    /// Prepend an enclosing label.
    pub fn within(mut self, label: &str) -> Self {
        self.chain.insert(0, label.to_string());
        self
    }

    /// Record the position of the failing step in its own pipeline. Only
    /// the innermost pipeline's index is kept.
    fn at_index(mut self, index: usize) -> Self {
        self.index.get_or_insert(index);
        self
    }

    /// Zero-based position of the failing step within the innermost pipeline.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Label of the innermost step, the one that actually failed.
    pub fn failing_step(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }

    pub fn cause(&self) -> &Error {
        &self.cause
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.cause,
            Error::Cancelled | Error::Exec(crate::error::ExecError::Cancelled { .. })
        )
    }
}

impl From<Error> for PipelineFailure {
    fn from(cause: Error) -> Self {
        Self::new(cause)
    }
}

/// Receives progress from running pipelines.
pub trait PipelineObserver: Send + Sync {
    fn on_state(&self, _pipeline: &str, _state: PipelineState) {}

    /// `outcome` is `None` when the step failed.
    fn on_step(&self, _label: &str, _outcome: Option<StepOutcome>) {}
}

/// Shared inputs for every step of a run.
pub struct StepContext<'a> {
    runner: &'a dyn CommandRunner,
    env: &'a EnvOverlay,
    cancel: &'a CancelSignal,
    host_os: String,
    strategy: ProbeStrategy,
    observer: Option<&'a dyn PipelineObserver>,
}

impl<'a> StepContext<'a> {
    pub fn new(runner: &'a dyn CommandRunner, env: &'a EnvOverlay, cancel: &'a CancelSignal) -> Self {
        Self {
            runner,
            env,
            cancel,
            host_os: std::env::consts::OS.to_string(),
            strategy: ProbeStrategy::default(),
            observer: None,
        }
    }

    /// Override the OS identifier used to resolve platform-specific steps.
    pub fn with_host_os(mut self, os: impl Into<String>) -> Self {
        self.host_os = os.into();
        self
    }

    pub fn with_probe_strategy(mut self, strategy: ProbeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn PipelineObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn env(&self) -> &'a EnvOverlay {
        self.env
    }

    fn invoker(&self) -> Invoker<'a> {
        Invoker::new(self.runner, self.env, self.cancel)
    }

    fn provisioner(&self) -> Provisioner<'a> {
        Provisioner::new(self.invoker(), self.strategy)
    }

    fn platform(&self) -> Platform {
        Platform::from_os(&self.host_os)
    }

    fn notify_state(&self, pipeline: &str, state: PipelineState) {
        debug!(pipeline, ?state, "pipeline state");
        if let Some(observer) = self.observer {
            observer.on_state(pipeline, state);
        }
    }

    fn notify_step(&self, label: &str, outcome: Option<StepOutcome>) {
        if let Some(observer) = self.observer {
            observer.on_step(label, outcome);
        }
    }
}

/// A named, ordered list of steps.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run<'a>(&self, ctx: &StepContext<'a>) -> Result<(), PipelineFailure> {
        ctx.notify_state(&self.name, PipelineState::Pending);

        for (index, step) in self.steps.iter().enumerate() {
            ctx.notify_state(&self.name, PipelineState::Running { step: index });
            if let Err(failure) = step.run(ctx).await {
                ctx.notify_state(&self.name, PipelineState::Failed { step: index });
                return Err(failure.at_index(index));
            }
        }

        ctx.notify_state(&self.name, PipelineState::Succeeded);
        Ok(())
    }

    /// One line per step, nested steps indented, secrets masked.
    pub fn describe(&self, env: &EnvOverlay) -> Vec<String> {
        let mut out = Vec::new();
        self.render_into(env, 0, &mut out);
        out
    }

    fn render_into(&self, env: &EnvOverlay, depth: usize, out: &mut Vec<String>) {
        for step in &self.steps {
            step.render(env, depth, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::fake::FakeRunner;
    use crate::workdir::CWD_LOCK;
    use std::sync::Mutex;

    fn echo(label: &str) -> Step {
        Step::command(label, CommandSpec::new("echo", [label]))
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<(String, PipelineState)>>,
        steps: Mutex<Vec<(String, bool)>>,
    }

    impl PipelineObserver for Recorder {
        fn on_state(&self, pipeline: &str, state: PipelineState) {
            self.states
                .lock()
                .unwrap()
                .push((pipeline.to_string(), state));
        }

        fn on_step(&self, label: &str, outcome: Option<StepOutcome>) {
            self.steps
                .lock()
                .unwrap()
                .push((label.to_string(), outcome.is_some()));
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel);

        let pipeline = Pipeline::new("ordered")
            .step(echo("one"))
            .step(echo("two"))
            .step(echo("three"));
        pipeline.run(&ctx).await.unwrap();

        assert_eq!(runner.calls(), vec!["echo one", "echo two", "echo three"]);
    }

    #[tokio::test]
    async fn test_fail_fast_at_every_index() {
        const STEPS: usize = 5;
        for failing in 0..STEPS {
            let runner = FakeRunner::new().failing_on(&format!("echo step-{}", failing));
            let env = EnvOverlay::new();
            let cancel = CancelSignal::never();
            let recorder = Recorder::default();
            let ctx = StepContext::new(&runner, &env, &cancel).with_observer(&recorder);

            let pipeline = (0..STEPS).fold(Pipeline::new("instrumented"), |p, i| {
                p.step(echo(&format!("step-{}", i)))
            });
            let failure = pipeline.run(&ctx).await.unwrap_err();

            assert_eq!(runner.calls().len(), failing + 1);
            assert_eq!(failure.failing_step(), Some(format!("step-{}", failing).as_str()));
            assert_eq!(failure.index(), Some(failing));
            let states = recorder.states.lock().unwrap();
            assert_eq!(
                states.last().unwrap(),
                &("instrumented".to_string(), PipelineState::Failed { step: failing })
            );
        }
    }

    #[tokio::test]
    async fn test_state_transitions_on_success() {
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let recorder = Recorder::default();
        let ctx = StepContext::new(&runner, &env, &cancel).with_observer(&recorder);

        Pipeline::new("p")
            .step(echo("a"))
            .step(echo("b"))
            .run(&ctx)
            .await
            .unwrap();

        let states: Vec<PipelineState> = recorder
            .states
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(
            states,
            vec![
                PipelineState::Pending,
                PipelineState::Running { step: 0 },
                PipelineState::Running { step: 1 },
                PipelineState::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_bring_up_stops_at_failing_init() {
        let runner = FakeRunner::new().failing_on("echo run-init");
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel);

        let bring_up = Pipeline::new("configure")
            .step(Step::nested("build-init", Pipeline::new("build-init").step(echo("build-init"))))
            .step(Step::nested("start-db", Pipeline::new("start-db").step(echo("start-db"))))
            .step(Step::nested("run-init", Pipeline::new("run-init").step(echo("run-init"))))
            .step(Step::nested("stop-db", Pipeline::new("stop-db").step(echo("stop-db"))))
            .step(Step::nested(
                "build-server",
                Pipeline::new("build-server").step(echo("build-server")),
            ));

        let failure = bring_up.run(&ctx).await.unwrap_err();

        assert_eq!(runner.count("echo build-server"), 0);
        assert_eq!(runner.count("echo stop-db"), 0);
        assert_eq!(failure.chain(), ["run-init", "run-init"]);
        assert_eq!(failure.index(), Some(0));
        assert!(failure.to_string().starts_with("`run-init` -> `run-init`: "));
        assert!(matches!(failure.cause(), Error::Exec(_)));
    }

    #[tokio::test]
    async fn test_arbitrary_nesting_depth() {
        let runner = FakeRunner::new().failing_on("echo leaf");
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel);

        let mut pipeline = Pipeline::new("leaf").step(echo("leaf"));
        for depth in 0..4 {
            pipeline = Pipeline::new(format!("level-{}", depth))
                .step(Step::nested(format!("level-{}", depth), pipeline));
        }

        let failure = pipeline.run(&ctx).await.unwrap_err();
        assert_eq!(
            failure.chain(),
            ["level-3", "level-2", "level-1", "level-0", "leaf"]
        );
    }

    #[tokio::test]
    async fn test_compose_step_uses_platform_syntax() {
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();

        let pipeline = Pipeline::new("db").step(Step::compose("compose up", ComposeAction::Up));

        let linux = StepContext::new(&runner, &env, &cancel).with_host_os("linux");
        pipeline.run(&linux).await.unwrap();
        let mac = StepContext::new(&runner, &env, &cancel).with_host_os("darwin");
        pipeline.run(&mac).await.unwrap();

        assert_eq!(runner.calls(), vec!["docker-compose up -d", "docker compose up -d"]);
    }

    #[tokio::test]
    async fn test_compose_on_unknown_platform_fails() {
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel).with_host_os("haiku");

        let failure = Pipeline::new("db")
            .step(Step::compose("compose down", ComposeAction::Down))
            .run(&ctx)
            .await
            .unwrap_err();

        assert!(matches!(failure.cause(), Error::UnsupportedPlatform(os) if os == "haiku"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scoped_step_restores_directory_on_failure() {
        let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();

        let runner = FakeRunner::new().failing_on("echo inside");
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel);

        let failure = Pipeline::new("scoped")
            .step(Step::scoped(
                "in temp",
                temp.path(),
                Pipeline::new("inner").step(echo("inside")),
            ))
            .run(&ctx)
            .await
            .unwrap_err();

        assert_eq!(failure.chain(), ["in temp", "inside"]);
        assert_eq!(std::env::current_dir().unwrap(), original);
    }

    #[tokio::test]
    async fn test_scoped_step_restores_directory_on_success() {
        let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();

        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel);

        Pipeline::new("scoped")
            .step(Step::scoped(
                "in temp",
                temp.path(),
                Pipeline::new("inner").step(echo("inside")),
            ))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(std::env::current_dir().unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_scope_directory_is_directory_error() {
        let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let ctx = StepContext::new(&runner, &env, &cancel);

        let failure = Pipeline::new("scoped")
            .step(Step::scoped(
                "in missing",
                "no/such/dir",
                Pipeline::new("inner").step(echo("inside")),
            ))
            .run(&ctx)
            .await
            .unwrap_err();

        assert!(matches!(failure.cause(), Error::Directory { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_step_skips_it() {
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let (handle, cancel) = cancel_pair();
        handle.cancel();
        let ctx = StepContext::new(&runner, &env, &cancel);

        let failure = Pipeline::new("p")
            .step(echo("never"))
            .run(&ctx)
            .await
            .unwrap_err();

        assert!(failure.is_cancelled());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_network_scenario() {
        let runner = FakeRunner::new();
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let recorder = Recorder::default();
        let ctx = StepContext::new(&runner, &env, &cancel).with_observer(&recorder);

        Pipeline::new("reqs")
            .step(Step::ensure("network", ResourceDescriptor::network("app-net")))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "docker network ls --format {{.Name}}",
                "docker network create app-net"
            ]
        );
        assert_eq!(
            recorder.steps.lock().unwrap().as_slice(),
            &[("network".to_string(), true)]
        );
    }

    #[test]
    fn test_describe_masks_secrets_and_indents() {
        let mut env = EnvOverlay::new();
        env.set_secret("SECRET_KEY_BASE", "s3cr3t");

        let pipeline = Pipeline::new("outer")
            .step(Step::scoped(
                "db",
                "docker/postgres",
                Pipeline::new("inner").step(Step::compose("up", ComposeAction::Up)),
            ))
            .step(Step::command(
                "run",
                CommandSpec::new("docker", ["run", "-e", "SECRET_KEY_BASE=s3cr3t", "app"]),
            ));

        assert_eq!(
            pipeline.describe(&env),
            vec![
                "db: in docker/postgres",
                "  up: compose up (syntax depends on platform)",
                "run: docker run -e SECRET_KEY_BASE=*** app",
            ]
        );
    }
}
