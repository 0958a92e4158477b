//! Idempotently provisioned container-runtime resources.

use derive_more::Display;
use serde::Serialize;

use crate::command::CommandSpec;

const RUNTIME: &str = "docker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[display("network")]
    Network,
    #[display("volume")]
    Volume,
    #[display("container")]
    Container,
    #[display("registry")]
    Registry,
}

impl ResourceKind {
    /// Containers and registries are restarted when present; networks and
    /// volumes are left alone.
    pub fn is_container(self) -> bool {
        matches!(self, ResourceKind::Container | ResourceKind::Registry)
    }

    /// Listing that prints one `name` (or `name<TAB>state`) per line.
    pub fn list_exact(self) -> CommandSpec {
        let args: &[&str] = match self {
            ResourceKind::Network => &["network", "ls", "--format", "{{.Name}}"],
            ResourceKind::Volume => &["volume", "ls", "--format", "{{.Name}}"],
            ResourceKind::Container | ResourceKind::Registry => &[
                "container",
                "ls",
                "-a",
                "--format",
                "{{.Names}}\t{{.State}}",
            ],
        };
        CommandSpec::new(RUNTIME, args.iter().copied()).captured()
    }

    /// The runtime's default table listing.
    pub fn list_table(self) -> CommandSpec {
        let args: &[&str] = match self {
            ResourceKind::Network => &["network", "ls"],
            ResourceKind::Volume => &["volume", "ls"],
            ResourceKind::Container | ResourceKind::Registry => &["container", "ls", "-a"],
        };
        CommandSpec::new(RUNTIME, args.iter().copied()).captured()
    }
}

/// A named resource plus whatever its creation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    /// Extra arguments after the name (networks, volumes) or after
    /// `--name <name>` (containers; must end with the image).
    pub create_args: Vec<String>,
}

impl ResourceDescriptor {
    pub fn network(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Network, name, Vec::new())
    }

    pub fn volume(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Volume, name, Vec::new())
    }

    pub fn container<I, S>(name: impl Into<String>, run_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            ResourceKind::Container,
            name,
            run_args.into_iter().map(Into::into).collect(),
        )
    }

    /// A local image registry publishing `host_port` on the registry's 5000.
    pub fn registry(name: impl Into<String>, host_port: &str, image: impl Into<String>) -> Self {
        Self::new(
            ResourceKind::Registry,
            name,
            vec![
                "--restart=always".to_string(),
                "-p".to_string(),
                format!("{}:5000", host_port),
                image.into(),
            ],
        )
    }

    /// Connect a container or registry to `network` when it is created.
    pub fn on_network(mut self, network: impl Into<String>) -> Self {
        let mut args = vec!["--network".to_string(), network.into()];
        args.append(&mut self.create_args);
        self.create_args = args;
        self
    }

    fn new(kind: ResourceKind, name: impl Into<String>, create_args: Vec<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            create_args,
        }
    }

    pub fn create_command(&self) -> CommandSpec {
        let mut args: Vec<String> = match self.kind {
            ResourceKind::Network => vec!["network".into(), "create".into(), self.name.clone()],
            ResourceKind::Volume => vec!["volume".into(), "create".into(), self.name.clone()],
            ResourceKind::Container | ResourceKind::Registry => vec![
                "run".into(),
                "-d".into(),
                "--name".into(),
                self.name.clone(),
            ],
        };
        args.extend(self.create_args.iter().cloned());
        CommandSpec::new(RUNTIME, args)
    }

    pub fn start_command(&self) -> CommandSpec {
        CommandSpec::new(RUNTIME, ["start", self.name.as_str()])
    }

    pub fn unpause_command(&self) -> CommandSpec {
        CommandSpec::new(RUNTIME, ["unpause", self.name.as_str()])
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// What `ensure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    #[display("created")]
    Created,
    #[display("already present")]
    AlreadyPresent,
    #[display("started")]
    Started,
}

/// Names of the containers attached to `network`, space separated.
pub(crate) fn inspect_network_members(network: &str) -> CommandSpec {
    CommandSpec::new(
        RUNTIME,
        [
            "network",
            "inspect",
            network,
            "--format",
            "{{range .Containers}}{{.Name}} {{end}}",
        ],
    )
    .captured()
}

pub(crate) fn inspect_network_raw(network: &str) -> CommandSpec {
    CommandSpec::new(RUNTIME, ["network", "inspect", network]).captured()
}

pub(crate) fn connect_network(network: &str, container: &str) -> CommandSpec {
    CommandSpec::new(RUNTIME, ["network", "connect", network, container])
}
