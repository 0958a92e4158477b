//! In-memory container runtime used by the unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::cancel::CancelSignal;
use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::ExecError;

#[derive(Default)]
struct Runtime {
    networks: BTreeSet<String>,
    volumes: BTreeSet<String>,
    containers: BTreeMap<String, &'static str>,
    attachments: BTreeMap<String, Vec<String>>,
}

#[derive(Default)]
pub(crate) struct FakeRunner {
    runtime: Mutex<Runtime>,
    calls: Mutex<Vec<String>>,
    failures: Vec<String>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_network(self, name: &str) -> Self {
        self.runtime.lock().unwrap().networks.insert(name.to_string());
        self
    }

    pub(crate) fn with_container(self, name: &str, running: bool) -> Self {
        self.with_container_state(name, if running { "running" } else { "exited" })
    }

    pub(crate) fn with_paused_container(self, name: &str) -> Self {
        self.with_container_state(name, "paused")
    }

    fn with_container_state(self, name: &str, state: &'static str) -> Self {
        self.runtime
            .lock()
            .unwrap()
            .containers
            .insert(name.to_string(), state);
        self
    }

    /// Every command whose rendered line starts with `prefix` exits 1.
    pub(crate) fn failing_on(mut self, prefix: &str) -> Self {
        self.failures.push(prefix.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of issued commands starting with `prefix`.
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    fn respond(&self, args: &[&str]) -> String {
        let mut rt = self.runtime.lock().unwrap();
        match args {
            ["network", "ls", "--format", _] => join_lines(rt.networks.iter()),
            ["network", "ls"] => table("NETWORK ID     NAME", rt.networks.iter()),
            ["volume", "ls", "--format", _] => join_lines(rt.volumes.iter()),
            ["volume", "ls"] => table("DRIVER    VOLUME NAME", rt.volumes.iter()),
            ["container", "ls", "-a", "--format", _] => rt
                .containers
                .iter()
                .map(|(name, state)| format!("{}\t{}\n", name, state))
                .collect(),
            ["container", "ls", "-a"] => table("CONTAINER ID   NAMES", rt.containers.keys()),
            ["network", "create", name] => {
                rt.networks.insert(name.to_string());
                String::new()
            }
            ["volume", "create", name] => {
                rt.volumes.insert(name.to_string());
                String::new()
            }
            ["run", "-d", "--name", name, ..] | ["start", name] | ["unpause", name] => {
                rt.containers.insert(name.to_string(), "running");
                String::new()
            }
            ["network", "inspect", network, "--format", _] => rt
                .attachments
                .get(*network)
                .map(|members| members.join(" "))
                .unwrap_or_default(),
            ["network", "inspect", network] => format!(
                "[{{\"Name\": \"{}\", \"Containers\": {:?}}}]",
                network,
                rt.attachments.get(*network).cloned().unwrap_or_default()
            ),
            ["network", "connect", network, container] => {
                rt.attachments
                    .entry(network.to_string())
                    .or_default()
                    .push(container.to_string());
                String::new()
            }
            _ => String::new(),
        }
    }
}

fn join_lines<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.map(|n| format!("{}\n", n)).collect()
}

fn table<'a>(header: &str, names: impl Iterator<Item = &'a String>) -> String {
    let mut out = format!("{}\n", header);
    for (idx, name) in names.enumerate() {
        out.push_str(&format!("{:012x}   {}\n", idx + 1, name));
    }
    out
}

#[async_trait]
impl CommandRunner for FakeRunner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn run(
        &self,
        spec: &CommandSpec,
        _cancel: &CancelSignal,
    ) -> Result<CommandOutput, ExecError> {
        let line = spec.display_line();
        self.calls.lock().unwrap().push(line.clone());

        if self.failures.iter().any(|prefix| line.starts_with(prefix)) {
            return Err(ExecError::Exit {
                command: line,
                code: Some(1),
                stderr: "forced failure".to_string(),
            });
        }

        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        let stdout = if spec.program == "docker" {
            self.respond(&args)
        } else {
            String::new()
        };
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }
}
