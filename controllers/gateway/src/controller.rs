//! Main controller implementation.
//!
//! Wires the local cluster (Gateway watcher, Service CIDR discovery), the leader
//! connection and the reconcile worker together, and supervises their tasks.

use crate::backoff::FibonacciBackoff;
use crate::config::Config;
use crate::error::ControllerError;
use crate::gateway_reader::KubeGatewayReader;
use crate::metrics::{Metrics, ProbeState, serve_probes};
use crate::reconciler::Reconciler;
use crate::service_cidr::{KubeServiceCidrSource, ServiceCidrResolver};
use crate::watcher::Watcher;
use crate::worker::Worker;
use common_area::{KubeRemoteCommonArea, RemoteCommonAreaRegistry};
use crds::Gateway;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Gateway controller and its background tasks.
pub struct Controller {
    registry: Arc<RemoteCommonAreaRegistry>,
    gateway_watcher: JoinHandle<Result<(), ControllerError>>,
    reconcile_worker: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Connects to both clusters and starts the background tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Gateway Controller for cluster {}", config.cluster_id);

        let kube_client = Client::try_default().await?;

        let leader = KubeRemoteCommonArea::from_kubeconfig(
            config.leader_cluster_id.clone(),
            config.leader_namespace.clone(),
            &config.leader_kubeconfig,
            config.remote_call_timeout,
        )
        .await
        .map_err(|e| {
            error!("Failed to connect to leader cluster {}: {}", config.leader_cluster_id, e);
            ControllerError::CommonArea(e)
        })?;
        let registry = Arc::new(RemoteCommonAreaRegistry::new());
        registry.insert(Arc::new(leader));

        let service_cidr = ServiceCidrResolver::new(
            config.service_cidr.clone(),
            Arc::new(KubeServiceCidrSource::new(kube_client.clone())),
        );
        let reconciler = Arc::new(Reconciler::new(
            config.cluster_id.clone(),
            config.namespace.clone(),
            config.pod_cidrs.clone(),
            Arc::new(KubeGatewayReader::new(kube_client.clone())),
            service_cidr,
        ));

        let probe_state = ProbeState::new(Arc::new(Metrics::new()?));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let worker = Worker::new(
            Arc::clone(&reconciler),
            Arc::clone(&registry),
            probe_state.clone(),
            FibonacciBackoff::default(),
            events_tx.clone(),
        );
        let reconcile_worker = tokio::spawn(worker.run(events_rx));

        let gateway_api: Api<Gateway> = Api::namespaced(kube_client, &config.namespace);
        let watcher = Watcher::new(gateway_api, events_tx);
        let gateway_watcher = tokio::spawn(async move { watcher.watch_gateways().await });

        let probe_server = tokio::spawn(serve_probes(config.probe_addr, probe_state));

        Ok(Self {
            registry,
            gateway_watcher,
            reconcile_worker,
            probe_server,
        })
    }

    /// Runs until a task exits or Ctrl-C is received.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Gateway Controller running, leaders: {:?}", self.registry.cluster_ids());

        // The tasks run forever; any exit is a failure
        let result = tokio::select! {
            result = &mut self.gateway_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Gateway watcher panicked: {e}")))
                    .and_then(|r| r)
            }
            result = &mut self.reconcile_worker => {
                result.map_err(|e| ControllerError::Watch(format!("Reconcile worker panicked: {e}")))
                    .and_then(|r| r)
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Watch(format!("Probe server panicked: {e}")))
                    .and_then(|r| r)
            }
            signal = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                signal.map_err(ControllerError::from)
            }
        };

        self.gateway_watcher.abort();
        self.reconcile_worker.abort();
        self.probe_server.abort();

        if let Err(e) = &result {
            error!("Gateway Controller stopped: {}", e);
        }
        result
    }
}
