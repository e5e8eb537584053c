//! Rolling-deployment scale-set decisions
//!
//! Both operations are a single list-then-act pass. They never return an
//! error to the caller: collaborator failures are logged and reported as
//! [`Outcome::Fatal`], and the caller's poller decides when to call again.

use crate::compute::{ApiEntityReference, ComputeError, ScaleSet, ScaleSetsClient};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_GATEWAY_PREFIX: &str = "gateway-vmss";

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("refusing to delete {name}: it is the only scale set in the resource group")]
    SoleScaleset { name: String },
}

/// Result of one cleaner pass
#[derive(Debug)]
pub enum Outcome {
    /// Nothing left to do
    Converged,
    /// Desired state not reached yet; call again later
    Retryable,
    /// Give up on this cycle
    Fatal(CleanerError),
}

impl Outcome {
    /// Boolean retry signal expected by pollers
    pub fn should_retry(&self) -> bool {
        !matches!(self, Outcome::Fatal(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Converged => "converged",
            Outcome::Retryable => "retryable",
            Outcome::Fatal(_) => "fatal",
        }
    }

    pub fn report(&self) -> OutcomeReport {
        OutcomeReport {
            outcome: self.as_str(),
            retry: self.should_retry(),
            error: match self {
                Outcome::Fatal(e) => Some(e.to_string()),
                _ => None,
            },
        }
    }
}

/// Serializable summary of an [`Outcome`]
#[derive(Debug, Serialize)]
pub struct OutcomeReport {
    pub outcome: &'static str,
    pub retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Naming convention that marks a scale set as a gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayMatcher {
    prefix: String,
}

impl Default for GatewayMatcher {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_GATEWAY_PREFIX)
    }
}

impl GatewayMatcher {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }
}

/// Desired health-probe configuration for gateway scale sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSpec {
    /// Probe resource id; `None` clears the probe
    pub health_probe_id: Option<String>,
}

impl ProbeSpec {
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            health_probe_id: Some(id.into()),
        }
    }

    /// Probe `probe` on load balancer `load_balancer`
    pub fn load_balancer_probe(
        subscription_id: &str,
        resource_group: &str,
        load_balancer: &str,
        probe: &str,
    ) -> Self {
        Self::with_id(format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/loadBalancers/{}/probes/{}",
            subscription_id, resource_group, load_balancer, probe
        ))
    }

    pub fn apply(&self, scale_set: &mut ScaleSet) {
        scale_set.network_profile_mut().health_probe =
            self.health_probe_id.as_ref().map(|id| ApiEntityReference {
                id: Some(id.clone()),
            });
    }
}

pub struct Cleaner<C: ScaleSetsClient> {
    client: Arc<C>,
    gateway: GatewayMatcher,
    probe: ProbeSpec,
    protect_sole_scaleset: bool,
}

impl<C: ScaleSetsClient> Cleaner<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            gateway: GatewayMatcher::default(),
            probe: ProbeSpec::default(),
            protect_sole_scaleset: false,
        }
    }

    pub fn with_gateway(mut self, gateway: GatewayMatcher) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_probe(mut self, probe: ProbeSpec) -> Self {
        self.probe = probe;
        self
    }

    /// Refuse to delete the target when it is the only scale set left
    pub fn protect_sole_scaleset(mut self, protect: bool) -> Self {
        self.protect_sole_scaleset = protect;
        self
    }

    /// Delete `target` if the deployment created it, reporting whether to poll again.
    ///
    /// An empty listing or a listing without the target is retryable; a
    /// listing failure is fatal.
    pub async fn remove_failed_new_scaleset(
        &self,
        cancel: &CancellationToken,
        resource_group: &str,
        target: &str,
    ) -> Outcome {
        let scale_sets = match guarded(cancel, self.client.list(resource_group)).await {
            Ok(scale_sets) => scale_sets,
            Err(e) => {
                warn!(resource_group = %resource_group, error = %e, "Failed to list scale sets");
                return Outcome::Fatal(e);
            }
        };

        if scale_sets.is_empty() {
            debug!(resource_group = %resource_group, "No scale sets yet");
            return Outcome::Retryable;
        }

        if !scale_sets
            .iter()
            .any(|scale_set| scale_set.name.as_deref() == Some(target))
        {
            debug!(
                resource_group = %resource_group,
                vmss = %target,
                "Target scale set not present yet"
            );
            return Outcome::Retryable;
        }

        if self.protect_sole_scaleset && scale_sets.len() == 1 {
            warn!(
                resource_group = %resource_group,
                vmss = %target,
                "Target is the only scale set, not deleting"
            );
            return Outcome::Fatal(CleanerError::SoleScaleset {
                name: target.to_string(),
            });
        }

        if scale_sets.len() == 1 {
            warn!(
                resource_group = %resource_group,
                vmss = %target,
                "Deleting the only scale set in the resource group"
            );
        }

        info!(resource_group = %resource_group, vmss = %target, "Deleting scale set");
        match guarded(cancel, self.client.delete_and_wait(resource_group, target)).await {
            Ok(()) => {
                info!(resource_group = %resource_group, vmss = %target, "Deleted scale set");
                Outcome::Retryable
            }
            Err(e) => {
                warn!(
                    resource_group = %resource_group,
                    vmss = %target,
                    error = %e,
                    "Failed to delete scale set"
                );
                Outcome::Fatal(e)
            }
        }
    }

    /// Point every gateway scale set at the desired health probe.
    ///
    /// The first failed update aborts the pass.
    pub async fn update_vmss_probes(
        &self,
        cancel: &CancellationToken,
        resource_group: &str,
    ) -> Outcome {
        let scale_sets = match guarded(cancel, self.client.list(resource_group)).await {
            Ok(scale_sets) => scale_sets,
            Err(e) => {
                warn!(resource_group = %resource_group, error = %e, "Failed to list scale sets");
                return Outcome::Fatal(e);
            }
        };

        for mut scale_set in scale_sets {
            let Some(name) = scale_set.name.clone() else {
                continue;
            };
            if !self.gateway.matches(&name) {
                continue;
            }

            self.probe.apply(&mut scale_set);
            info!(
                resource_group = %resource_group,
                vmss = %name,
                health_probe = ?self.probe.health_probe_id,
                "Updating gateway health probe"
            );

            if let Err(e) = guarded(
                cancel,
                self.client
                    .create_or_update_and_wait(resource_group, &name, &scale_set),
            )
            .await
            {
                warn!(
                    resource_group = %resource_group,
                    vmss = %name,
                    error = %e,
                    "Failed to update scale set"
                );
                return Outcome::Fatal(e);
            }
        }

        Outcome::Converged
    }
}

/// Run a compute call unless `cancel` fires first
async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T, CleanerError>
where
    F: Future<Output = Result<T, ComputeError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CleanerError::Cancelled),
        result = call => result.map_err(CleanerError::from),
    }
}
