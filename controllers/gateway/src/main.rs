//! Gateway Controller
//!
//! Member-cluster controller that publishes the cluster's network identity to
//! the leader of its ClusterSet:
//! - Watches local `Gateway` resources
//! - Resolves the Service CIDR (static or discovered)
//! - Keeps one `ClusterInfo` `ResourceExport` in the leader's shared namespace in
//!   sync with the current Gateways

mod backoff;
mod cluster_info;
mod config;
mod controller;
mod error;
mod gateway_reader;
mod metrics;
mod reconciler;
mod service_cidr;
#[cfg(test)]
mod test_utils;
mod watcher;
mod worker;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Gateway Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Cluster ID: {}", config.cluster_id);
    info!("  Namespace: {}", config.namespace);
    info!("  Leader: {} (namespace {})", config.leader_cluster_id, config.leader_namespace);
    info!("  Leader kubeconfig: {}", config.leader_kubeconfig.display());
    info!(
        "  Service CIDR: {}",
        config.service_cidr.as_deref().unwrap_or("discovered at runtime")
    );
    info!("  Pod CIDRs: {:?}", config.pod_cidrs);
    info!("  Remote call timeout: {:?}", config.remote_call_timeout);
    info!("  Probe address: {}", config.probe_addr);

    let controller = Controller::new(config).await?;
    controller.run().await
}
