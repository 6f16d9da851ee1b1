//! Test utilities for unit testing the reconciler
//!
//! In-memory stand-ins for the local cluster (Gateways, Service CIDR source)
//! and fixtures for the leader's ResourceExports.

use crate::error::ControllerError;
use crate::gateway_reader::{GatewayFact, GatewayReader};
use crate::reconciler::Reconciler;
use crate::service_cidr::{ServiceCidrResolver, ServiceCidrSource};
use chrono::TimeZone;
use common_area::MockRemoteCommonArea;
use crds::{ClusterInfo, GatewayInfo, ResourceExport, ResourceExportSpec, cluster_info_export_name};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CLUSTER_ID: &str = "cluster-a";
pub const LOCAL_NAMESPACE: &str = "default";
pub const LEADER_CLUSTER_ID: &str = "leader";
pub const LEADER_NAMESPACE: &str = "mcops-leader";
pub const SERVICE_CIDR: &str = "10.96.0.0/12";

/// Gateway fact in the local namespace, created `created_secs` after the epoch
pub fn gateway_fact(name: &str, gateway_ip: &str, created_secs: Option<i64>) -> GatewayFact {
    GatewayFact {
        namespace: LOCAL_NAMESPACE.to_string(),
        name: name.to_string(),
        gateway_ip: gateway_ip.to_string(),
        internal_ip: "172.11.10.1".to_string(),
        creation_timestamp: created_secs.map(|secs| Time(chrono::Utc.timestamp_opt(secs, 0).unwrap())),
    }
}

/// Gateway list backed by memory; tests mutate it between reconciliations
#[derive(Clone, Default)]
pub struct InMemoryGatewayReader {
    facts: Arc<Mutex<Vec<GatewayFact>>>,
}

impl InMemoryGatewayReader {
    pub fn new(facts: Vec<GatewayFact>) -> Self {
        Self {
            facts: Arc::new(Mutex::new(facts)),
        }
    }

    /// Add or replace a Gateway by name
    pub fn upsert(&self, fact: GatewayFact) {
        let mut facts = self.facts.lock().unwrap();
        facts.retain(|f| f.name != fact.name || f.namespace != fact.namespace);
        facts.push(fact);
    }

    pub fn remove(&self, name: &str) {
        self.facts.lock().unwrap().retain(|f| f.name != name);
    }
}

#[async_trait::async_trait]
impl GatewayReader for InMemoryGatewayReader {
    async fn list_gateways(&self, namespace: &str) -> Result<Vec<GatewayFact>, ControllerError> {
        Ok(self
            .facts
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.namespace == namespace)
            .cloned()
            .collect())
    }
}

/// Discovery that always succeeds with a fixed CIDR
pub struct StaticServiceCidrSource {
    cidr: String,
    calls: AtomicUsize,
}

impl StaticServiceCidrSource {
    pub fn new(cidr: &str) -> Self {
        Self {
            cidr: cidr.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ServiceCidrSource for StaticServiceCidrSource {
    async fn discover_service_cidr(&self, _namespace: &str) -> Result<String, ControllerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cidr.clone())
    }
}

/// Discovery that always fails
#[derive(Default)]
pub struct FailingServiceCidrSource {
    calls: AtomicUsize,
}

impl FailingServiceCidrSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ServiceCidrSource for FailingServiceCidrSource {
    async fn discover_service_cidr(&self, _namespace: &str) -> Result<String, ControllerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ControllerError::ServiceCidrUnresolvable(
            "expected a specific error but none was returned".to_string(),
        ))
    }
}

/// Reconciler over `reader` with `SERVICE_CIDR` configured statically
pub fn create_test_reconciler(reader: &InMemoryGatewayReader) -> Reconciler {
    Reconciler::new(
        CLUSTER_ID.to_string(),
        LOCAL_NAMESPACE.to_string(),
        Vec::new(),
        Arc::new(reader.clone()),
        ServiceCidrResolver::new(Some(SERVICE_CIDR.to_string()), Arc::new(FailingServiceCidrSource::default())),
    )
}

/// Reconciler over `reader` that discovers `SERVICE_CIDR` at runtime
pub fn create_test_reconciler_with_discovery(reader: &InMemoryGatewayReader) -> Reconciler {
    Reconciler::new(
        CLUSTER_ID.to_string(),
        LOCAL_NAMESPACE.to_string(),
        Vec::new(),
        Arc::new(reader.clone()),
        ServiceCidrResolver::new(None, Arc::new(StaticServiceCidrSource::new(SERVICE_CIDR))),
    )
}

/// Reconciler over `reader` whose Service CIDR cannot be determined
pub fn create_test_reconciler_without_cidr(reader: &InMemoryGatewayReader) -> Reconciler {
    Reconciler::new(
        CLUSTER_ID.to_string(),
        LOCAL_NAMESPACE.to_string(),
        Vec::new(),
        Arc::new(reader.clone()),
        ServiceCidrResolver::new(None, Arc::new(FailingServiceCidrSource::default())),
    )
}

pub fn create_test_leader() -> MockRemoteCommonArea {
    MockRemoteCommonArea::new(LEADER_CLUSTER_ID, LEADER_NAMESPACE)
}

/// The ClusterInfo export `CLUSTER_ID` would publish for these gateway IPs
pub fn create_test_export(gateway_ips: &[&str]) -> ResourceExport {
    ResourceExport::new(
        &cluster_info_export_name(CLUSTER_ID),
        ResourceExportSpec {
            name: CLUSTER_ID.to_string(),
            namespace: LOCAL_NAMESPACE.to_string(),
            kind: crds::CLUSTER_INFO_KIND.to_string(),
            cluster_info: Some(ClusterInfo {
                cluster_id: CLUSTER_ID.to_string(),
                service_cidr: SERVICE_CIDR.to_string(),
                gateway_infos: gateway_ips
                    .iter()
                    .map(|ip| GatewayInfo { gateway_ip: ip.to_string() })
                    .collect(),
                pod_cidrs: Vec::new(),
            }),
        },
    )
}

/// Same export, already marked for deletion and held by a finalizer
pub fn create_test_export_pending_deletion(gateway_ips: &[&str]) -> ResourceExport {
    let mut export = create_test_export(gateway_ips);
    export.metadata.finalizers = Some(vec!["resourceexport.multicluster.microscaler.io/cleanup".to_string()]);
    export.metadata.deletion_timestamp = Some(Time(chrono::Utc.timestamp_opt(1_000, 0).unwrap()));
    export
}
