//! Local Gateway reader.
//!
//! Lists the Gateway facts of the member cluster. Every reconciliation re-lists;
//! nothing is cached here beyond what the API server returns.

use crate::error::ControllerError;
use crds::Gateway;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::debug;

/// Local record of one gateway Node's addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFact {
    pub namespace: String,
    pub name: String,
    pub gateway_ip: String,
    pub internal_ip: String,
    pub creation_timestamp: Option<Time>,
}

impl From<&Gateway> for GatewayFact {
    fn from(gateway: &Gateway) -> Self {
        Self {
            namespace: gateway.namespace().unwrap_or_default(),
            name: gateway.name_any(),
            gateway_ip: gateway.spec.gateway_ip.clone(),
            internal_ip: gateway.spec.internal_ip.clone(),
            creation_timestamp: gateway.metadata.creation_timestamp.clone(),
        }
    }
}

/// Source of the current Gateway facts.
#[async_trait::async_trait]
pub trait GatewayReader: Send + Sync {
    /// Current full set of Gateways in `namespace`; empty is a valid answer.
    async fn list_gateways(&self, namespace: &str) -> Result<Vec<GatewayFact>, ControllerError>;
}

/// Reads Gateways from the local cluster's API server
pub struct KubeGatewayReader {
    client: Client,
}

impl KubeGatewayReader {
    /// Creates a reader on the local cluster client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl GatewayReader for KubeGatewayReader {
    async fn list_gateways(&self, namespace: &str) -> Result<Vec<GatewayFact>, ControllerError> {
        let api: Api<Gateway> = Api::namespaced(self.client.clone(), namespace);
        let gateways = api.list(&ListParams::default()).await?;
        debug!("Listed {} Gateways in namespace {}", gateways.items.len(), namespace);
        Ok(gateways.items.iter().map(GatewayFact::from).collect())
    }
}
