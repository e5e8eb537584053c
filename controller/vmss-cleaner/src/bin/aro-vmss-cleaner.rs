//! Scale-set cleaner binary - runs one cleaner pass and reports the outcome

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vmss_cleaner::{ArmScaleSetsClient, Cleaner, Command, Config};

/// Exit status when the caller should not poll again
const EXIT_FATAL: i32 = 2;

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse_config();
    init_tracing(config.log_json);

    info!("Starting ARO scale set cleaner");
    info!("  ARM endpoint: {}", config.arm_endpoint);
    info!("  API version: {}", config.api_version);
    info!("  Resource group: {}", config.resource_group());

    let client = Arc::new(ArmScaleSetsClient::new(config.arm_settings())?);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight operation");
            interrupt.cancel();
        }
    });

    let outcome = match &config.command {
        Command::RemoveFailed {
            resource_group,
            target,
            protect_sole_scaleset,
        } => {
            Cleaner::new(client)
                .protect_sole_scaleset(*protect_sole_scaleset)
                .remove_failed_new_scaleset(&cancel, resource_group, target)
                .await
        }
        Command::UpdateProbes { resource_group, .. } => {
            Cleaner::new(client)
                .with_gateway(config.gateway_matcher())
                .with_probe(config.probe_spec())
                .update_vmss_probes(&cancel, resource_group)
                .await
        }
    };

    println!("{}", serde_json::to_string(&outcome.report())?);
    info!(outcome = outcome.as_str(), retry = outcome.should_retry(), "Cleaner pass finished");

    if !outcome.should_retry() {
        std::process::exit(EXIT_FATAL);
    }
    Ok(())
}
