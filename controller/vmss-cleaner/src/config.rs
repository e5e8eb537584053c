//! Configuration for the scale-set cleaner binary

use crate::arm::{ArmClientSettings, DEFAULT_API_VERSION, DEFAULT_ARM_ENDPOINT};
use crate::cleaner::{GatewayMatcher, ProbeSpec, DEFAULT_GATEWAY_PREFIX};
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Configuration for the scale-set cleaner
#[derive(Debug, Clone, Parser)]
#[command(name = "aro-vmss-cleaner", version)]
#[command(about = "Cleans up failed deployment scale sets and reconciles gateway health probes")]
pub struct Config {
    /// Azure subscription holding the resource group
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: String,

    /// Bearer token for Azure Resource Manager
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Azure Resource Manager endpoint
    #[arg(long, env = "ARM_ENDPOINT", default_value = DEFAULT_ARM_ENDPOINT)]
    pub arm_endpoint: String,

    /// Compute API version
    #[arg(long, env = "ARM_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Delay between long-running operation polls when ARM sends no Retry-After
    #[arg(long, env = "LRO_POLL_INTERVAL_MS", default_value_t = 5000)]
    pub poll_interval_ms: u64,

    /// Maximum long-running operation polls before giving up
    #[arg(long, env = "LRO_MAX_POLLS", default_value_t = 360)]
    pub max_polls: u32,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Output logs in JSON format
    #[arg(long, env)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Delete the new scale set of a failed deployment
    RemoveFailed {
        /// Resource group holding the deployment's scale sets
        #[arg(long)]
        resource_group: String,

        /// Name of the scale set created by the new deployment
        #[arg(long)]
        target: String,

        /// Do not delete the target when it is the only scale set
        #[arg(long)]
        protect_sole_scaleset: bool,
    },
    /// Point gateway scale sets at the desired load-balancer health probe
    UpdateProbes {
        /// Resource group holding the gateway scale sets
        #[arg(long)]
        resource_group: String,

        /// Name prefix identifying gateway scale sets
        #[arg(long, default_value = DEFAULT_GATEWAY_PREFIX)]
        gateway_prefix: String,

        /// Load balancer owning the probe (probe is cleared when omitted)
        #[arg(long, requires = "probe")]
        load_balancer: Option<String>,

        /// Health probe name on the load balancer
        #[arg(long, requires = "load_balancer")]
        probe: Option<String>,
    },
}

impl Config {
    /// Parse configuration from command-line args and environment variables
    pub fn parse_config() -> Self {
        Config::parse()
    }

    pub fn resource_group(&self) -> &str {
        match &self.command {
            Command::RemoveFailed { resource_group, .. }
            | Command::UpdateProbes { resource_group, .. } => resource_group.as_str(),
        }
    }

    pub fn arm_settings(&self) -> ArmClientSettings {
        ArmClientSettings {
            endpoint: self.arm_endpoint.clone(),
            subscription_id: self.subscription_id.clone(),
            access_token: self.access_token.clone(),
            api_version: self.api_version.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_polls: self.max_polls,
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn gateway_matcher(&self) -> GatewayMatcher {
        match &self.command {
            Command::UpdateProbes { gateway_prefix, .. } => {
                GatewayMatcher::with_prefix(gateway_prefix.clone())
            }
            _ => GatewayMatcher::default(),
        }
    }

    /// Desired probe; the load balancer lives in the same resource group
    pub fn probe_spec(&self) -> ProbeSpec {
        match &self.command {
            Command::UpdateProbes {
                resource_group,
                load_balancer: Some(load_balancer),
                probe: Some(probe),
                ..
            } => ProbeSpec::load_balancer_probe(
                &self.subscription_id,
                resource_group,
                load_balancer,
                probe,
            ),
            _ => ProbeSpec::cleared(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec![
            "aro-vmss-cleaner",
            "--subscription-id",
            "sub",
            "--access-token",
            "token",
        ];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_remove_failed_args() {
        let config = parse(&[
            "--arm-endpoint",
            "https://management.azure.com",
            "remove-failed",
            "--resource-group",
            "rp-eastus",
            "--target",
            "rp-vmss-5678",
        ]);

        assert_eq!(config.resource_group(), "rp-eastus");
        match &config.command {
            Command::RemoveFailed {
                target,
                protect_sole_scaleset,
                ..
            } => {
                assert_eq!(target, "rp-vmss-5678");
                assert!(!protect_sole_scaleset);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(config.probe_spec(), ProbeSpec::cleared());
    }

    #[test]
    fn test_update_probes_with_load_balancer() {
        let config = parse(&[
            "update-probes",
            "--resource-group",
            "gwy-eastus",
            "--load-balancer",
            "gateway-lb-internal",
            "--probe",
            "gateway-probe",
        ]);

        assert_eq!(config.gateway_matcher().prefix(), DEFAULT_GATEWAY_PREFIX);
        assert_eq!(
            config.probe_spec().health_probe_id.as_deref(),
            Some("/subscriptions/sub/resourceGroups/gwy-eastus/providers/Microsoft.Network/loadBalancers/gateway-lb-internal/probes/gateway-probe")
        );
    }

    #[test]
    fn test_update_probes_requires_probe_with_load_balancer() {
        let result = Config::try_parse_from([
            "aro-vmss-cleaner",
            "--subscription-id",
            "sub",
            "--access-token",
            "token",
            "update-probes",
            "--resource-group",
            "gwy-eastus",
            "--load-balancer",
            "gateway-lb-internal",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_arm_settings() {
        let config = parse(&[
            "--poll-interval-ms",
            "250",
            "--max-polls",
            "12",
            "update-probes",
            "--resource-group",
            "gwy-eastus",
            "--gateway-prefix",
            "gwy-",
        ]);

        let settings = config.arm_settings();
        assert_eq!(settings.subscription_id, "sub");
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.max_polls, 12);
        assert!(config.gateway_matcher().matches("gwy-vmss-1"));
    }
}
