//! Idempotent provisioning: create when absent, otherwise reuse or start.

use tracing::info;

use crate::error::ExecError;
use crate::invoke::Invoker;
use crate::probe::{ContainerStatus, ProbeStrategy, Prober, ResourceState};
use crate::resource::{self, ProvisionOutcome, ResourceDescriptor};

pub struct Provisioner<'a> {
    invoker: Invoker<'a>,
    prober: Prober<'a>,
}

impl<'a> Provisioner<'a> {
    pub fn new(invoker: Invoker<'a>, strategy: ProbeStrategy) -> Self {
        Self {
            invoker,
            prober: Prober::new(invoker, strategy),
        }
    }

    /// Make sure the resource exists. Containers that exist but are not
    /// known to be running are started, or unpaused when paused.
    pub async fn ensure(&self, resource: &ResourceDescriptor) -> Result<ProvisionOutcome, ExecError> {
        let state = self.prober.state(resource.kind, &resource.name).await?;

        let outcome = match state {
            ResourceState::Absent => {
                self.invoker.run(resource.create_command()).await?;
                ProvisionOutcome::Created
            }
            ResourceState::Present { status } if resource.kind.is_container() => match status {
                Some(ContainerStatus::Running) => ProvisionOutcome::AlreadyPresent,
                Some(ContainerStatus::Paused) => {
                    self.invoker.run(resource.unpause_command()).await?;
                    ProvisionOutcome::Started
                }
                Some(ContainerStatus::Stopped) | None => {
                    self.invoker.run(resource.start_command()).await?;
                    ProvisionOutcome::Started
                }
            },
            ResourceState::Present { .. } => ProvisionOutcome::AlreadyPresent,
        };

        info!(kind = %resource.kind, resource = %resource.name, %outcome, "ensured resource");
        Ok(outcome)
    }

    /// Make sure `container` is connected to `network`.
    pub async fn ensure_attached(
        &self,
        network: &str,
        container: &str,
    ) -> Result<ProvisionOutcome, ExecError> {
        if self.prober.attached(network, container).await? {
            info!(network, container, "already attached");
            return Ok(ProvisionOutcome::AlreadyPresent);
        }
        self.invoker
            .run(resource::connect_network(network, container))
            .await?;
        info!(network, container, "attached container to network");
        Ok(ProvisionOutcome::Created)
    }
}
