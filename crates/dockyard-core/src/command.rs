//! External command specification and the runner trait.
//!
//! Every interaction with docker, kind, helm or mix goes through
//! [`CommandRunner::run`]. Implementations live in `dockyard-executor`.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::cancel::CancelSignal;
use crate::error::ExecError;

const MASK: &str = "***";

/// One overlay entry. Secret values are masked whenever a command is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvValue {
    pub value: String,
    pub secret: bool,
}

/// Environment variables layered over the ambient process environment for
/// a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvOverlay {
    vars: BTreeMap<String, EnvValue>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), value.into(), false);
    }

    pub fn set_secret(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), value.into(), true);
    }

    fn insert(&mut self, key: String, value: String, secret: bool) {
        self.vars.insert(key, EnvValue { value, secret });
    }

    /// `self` layered over `base`; entries in `self` win.
    pub fn merged_over(&self, base: &EnvOverlay) -> EnvOverlay {
        let mut vars = base.vars.clone();
        vars.extend(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        EnvOverlay { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Key/value pairs in key order, secrets included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
    }

    /// Non-empty secret values, longest first so overlapping secrets mask fully.
    pub fn secret_values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self
            .vars
            .values()
            .filter(|v| v.secret && !v.value.is_empty())
            .map(|v| v.value.as_str())
            .collect();
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));
        values
    }

    /// Replace every secret value occurring in `input` with a mask.
    pub fn redact(&self, input: &str) -> String {
        self.secret_values()
            .into_iter()
            .fold(input.to_string(), |acc, secret| acc.replace(secret, MASK))
    }
}

/// How the child's standard streams are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Forward to the caller's own stdout/stderr.
    #[default]
    Stream,
    /// Collect into [`CommandOutput`] for inspection.
    Capture,
}

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: EnvOverlay,
    pub output: OutputMode,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: EnvOverlay::new(),
            output: OutputMode::Stream,
        }
    }

    pub fn with_env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    /// Program and arguments joined by spaces with secret values masked.
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push_str(&format!("'{}'", arg));
            } else {
                line.push_str(arg);
            }
        }
        self.env.redact(&line)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

/// Result of a successful invocation. Empty when output was streamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes external processes.
///
/// Implementations spawn exactly one child per call, wait for it and report
/// non-zero exits as [`ExecError::Exit`]. No retries.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Name of this runner, used in logs.
    fn name(&self) -> &'static str;

    /// Run `spec` to completion, killing the child if `cancel` fires.
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, ExecError>;
}
