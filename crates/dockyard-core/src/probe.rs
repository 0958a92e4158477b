//! Resource existence probing.
//!
//! A probe lists the resources of one kind and tests membership by name.
//! [`ProbeStrategy::Exact`] asks the runtime for one name per line and
//! compares whole names. [`ProbeStrategy::Substring`] searches the default
//! table output, which can match a name that is merely contained in another
//! resource's name or metadata; such matches are logged as advisory.

use derive_more::Display;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, ExecError};
use crate::invoke::Invoker;
use crate::resource::{self, ResourceKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStrategy {
    #[default]
    #[display("exact")]
    Exact,
    #[display("substring")]
    Substring,
}

/// The `{{.State}}` column of a container listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    /// Needs `docker unpause`; `docker start` refuses paused containers.
    Paused,
    Stopped,
}

impl ContainerStatus {
    fn parse(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            _ => ContainerStatus::Stopped,
        }
    }
}

/// Observed state of a named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Absent,
    /// `status` is known only for containers listed with their state.
    Present { status: Option<ContainerStatus> },
}

impl ResourceState {
    pub fn is_present(self) -> bool {
        matches!(self, ResourceState::Present { .. })
    }
}

pub struct Prober<'a> {
    invoker: Invoker<'a>,
    strategy: ProbeStrategy,
}

impl<'a> Prober<'a> {
    pub fn new(invoker: Invoker<'a>, strategy: ProbeStrategy) -> Self {
        Self { invoker, strategy }
    }

    pub async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool, ExecError> {
        Ok(self.state(kind, name).await?.is_present())
    }

    pub async fn state(&self, kind: ResourceKind, name: &str) -> Result<ResourceState, ExecError> {
        let state = match self.strategy {
            ProbeStrategy::Exact => {
                let listing = self.invoker.run(kind.list_exact()).await?;
                let (state, ambiguity) = match_exact(kind, name, &listing.stdout);
                if let Some(err) = ambiguity {
                    debug!(error = %err, "ignoring partial match");
                }
                state
            }
            ProbeStrategy::Substring => {
                let listing = self.invoker.run(kind.list_table()).await?;
                let (state, ambiguity) = match_substring(kind, name, &listing.stdout);
                if let Some(err) = ambiguity {
                    warn!(error = %err, "probe result is best-effort");
                }
                state
            }
        };
        debug!(%kind, resource = name, ?state, strategy = %self.strategy, "probed resource");
        Ok(state)
    }

    /// Whether `container` is attached to `network`.
    pub async fn attached(&self, network: &str, container: &str) -> Result<bool, ExecError> {
        match self.strategy {
            ProbeStrategy::Exact => {
                let members = self
                    .invoker
                    .run(resource::inspect_network_members(network))
                    .await?;
                Ok(members.stdout.split_whitespace().any(|m| m == container))
            }
            ProbeStrategy::Substring => {
                let raw = self
                    .invoker
                    .run(resource::inspect_network_raw(network))
                    .await?;
                let found = raw.stdout.contains(container);
                if found {
                    let err = ambiguous(
                        ResourceKind::Network,
                        network,
                        format!("container '{}' matched by substring", container),
                    );
                    warn!(error = %err, "probe result is best-effort");
                }
                Ok(found)
            }
        }
    }
}

fn ambiguous(kind: ResourceKind, name: &str, reason: String) -> Error {
    Error::ProbeAmbiguous {
        kind,
        name: name.to_string(),
        reason,
    }
}

/// Whole-name match on the first column. A name that only occurs inside
/// another entry is absent, with the ambiguity returned for logging.
fn match_exact(kind: ResourceKind, name: &str, listing: &str) -> (ResourceState, Option<Error>) {
    for line in listing.lines() {
        let mut columns = line.split('\t');
        if columns.next().map(str::trim) != Some(name) {
            continue;
        }
        let status = if kind.is_container() {
            columns.next().map(ContainerStatus::parse)
        } else {
            None
        };
        return (ResourceState::Present { status }, None);
    }

    let ambiguity = listing.contains(name).then(|| {
        ambiguous(
            kind,
            name,
            "name only occurs inside another entry; treated as absent".to_string(),
        )
    });
    (ResourceState::Absent, ambiguity)
}

fn match_substring(
    kind: ResourceKind,
    name: &str,
    listing: &str,
) -> (ResourceState, Option<Error>) {
    if listing.contains(name) {
        let err = ambiguous(kind, name, "matched by substring of the listing".to_string());
        (ResourceState::Present { status: None }, Some(err))
    } else {
        (ResourceState::Absent, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSignal;
    use crate::command::EnvOverlay;
    use crate::fake::FakeRunner;

    async fn exists_with(
        runner: &FakeRunner,
        strategy: ProbeStrategy,
        kind: ResourceKind,
        name: &str,
    ) -> Result<bool, ExecError> {
        let env = EnvOverlay::new();
        let cancel = CancelSignal::never();
        let invoker = Invoker::new(runner, &env, &cancel);
        Prober::new(invoker, strategy).exists(kind, name).await
    }

    #[test]
    fn test_exact_match_on_whole_line() {
        let listing = "bridge\nhost\napp-net\nnone\n";
        assert_eq!(
            match_exact(ResourceKind::Network, "app-net", listing).0,
            ResourceState::Present { status: None }
        );
    }

    #[test]
    fn test_exact_ignores_longer_names() {
        let listing = "app-net-old\nbridge\n";
        let (state, ambiguity) = match_exact(ResourceKind::Network, "app-net", listing);
        assert_eq!(state, ResourceState::Absent);
        assert!(matches!(ambiguity, Some(Error::ProbeAmbiguous { .. })));
    }

    #[test]
    fn test_exact_reads_container_state() {
        let listing = "chatter_server\texited\nkind-registry\trunning\nold-registry\tpaused\n";
        let status = |name| match match_exact(ResourceKind::Container, name, listing).0 {
            ResourceState::Present { status } => status,
            ResourceState::Absent => panic!("{name} should be present"),
        };
        assert_eq!(status("kind-registry"), Some(ContainerStatus::Running));
        assert_eq!(status("chatter_server"), Some(ContainerStatus::Stopped));
        assert_eq!(status("old-registry"), Some(ContainerStatus::Paused));
    }

    #[test]
    fn test_substring_matches_table_output() {
        let listing = "NETWORK ID     NAME            DRIVER    SCOPE\n\
                       1a2b3c4d5e6f   app-net-old     bridge    local\n";
        let (state, ambiguity) = match_substring(ResourceKind::Network, "app-net", listing);
        assert!(state.is_present());
        assert!(matches!(
            ambiguity,
            Some(Error::ProbeAmbiguous { kind: ResourceKind::Network, ref name, .. }) if name == "app-net"
        ));

        let (state, ambiguity) = match_substring(ResourceKind::Network, "db-net", listing);
        assert!(!state.is_present());
        assert!(ambiguity.is_none());
    }

    #[tokio::test]
    async fn test_exists_finds_listed_network() {
        let runner = FakeRunner::new().with_network("app-net");
        for strategy in [ProbeStrategy::Exact, ProbeStrategy::Substring] {
            assert!(
                exists_with(&runner, strategy, ResourceKind::Network, "app-net")
                    .await
                    .unwrap(),
                "{strategy}"
            );
            assert!(
                !exists_with(&runner, strategy, ResourceKind::Network, "db-net")
                    .await
                    .unwrap(),
                "{strategy}"
            );
        }
    }

    #[tokio::test]
    async fn test_exists_longer_name_differs_by_strategy() {
        let runner = FakeRunner::new().with_network("app-net-old");

        let exact = exists_with(&runner, ProbeStrategy::Exact, ResourceKind::Network, "app-net")
            .await
            .unwrap();
        let substring =
            exists_with(&runner, ProbeStrategy::Substring, ResourceKind::Network, "app-net")
                .await
                .unwrap();

        assert!(!exact);
        // Substring matching reports the false positive.
        assert!(substring);
        assert_eq!(
            runner.calls(),
            vec!["docker network ls --format {{.Name}}", "docker network ls"]
        );
    }

    #[tokio::test]
    async fn test_exists_propagates_listing_failure() {
        let runner = FakeRunner::new().failing_on("docker volume ls");
        for strategy in [ProbeStrategy::Exact, ProbeStrategy::Substring] {
            let err = exists_with(&runner, strategy, ResourceKind::Volume, "app-data")
                .await
                .unwrap_err();
            assert!(
                matches!(err, ExecError::Exit { code: Some(1), .. }),
                "{strategy}"
            );
        }
    }

    #[tokio::test]
    async fn test_exists_finds_stopped_container() {
        let runner = FakeRunner::new().with_container("chatter_server", false);
        assert!(
            exists_with(
                &runner,
                ProbeStrategy::Exact,
                ResourceKind::Container,
                "chatter_server"
            )
            .await
            .unwrap()
        );
    }
}
