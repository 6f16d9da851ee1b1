//! ResourceExport CRD
//!
//! Lives in the leader cluster's shared namespace. A member cluster exports its
//! `ClusterInfo` through one `ResourceExport` per leader.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `spec.kind` value of a ClusterInfo export
pub const CLUSTER_INFO_KIND: &str = "ClusterInfo";

/// Plural resource name, used in Kubernetes-style error messages
pub const RESOURCE_EXPORT_PLURAL: &str = "resourceexports";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[kube(
    group = "multicluster.microscaler.io",
    version = "v1alpha1",
    kind = "ResourceExport",
    namespaced,
    printcolumn = r#"{"name":"Kind","type":"string","jsonPath":".spec.kind"}"#,
    printcolumn = r#"{"name":"Source","type":"string","jsonPath":".spec.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceExportSpec {
    /// Name of the exported resource (the cluster ID for ClusterInfo)
    pub name: String,

    /// Namespace of the exported resource in the member cluster
    pub namespace: String,

    /// Kind of the exported resource
    pub kind: String,

    /// Payload when `kind` is `ClusterInfo`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_info: Option<ClusterInfo>,
}

/// Network identity of one member cluster.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct ClusterInfo {
    /// ID of the member cluster
    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    /// Service ClusterIP range of the member cluster
    #[serde(rename = "serviceCIDR")]
    pub service_cidr: String,

    /// Gateways of the member cluster, in a stable order
    #[serde(rename = "gatewayInfos", default)]
    pub gateway_infos: Vec<GatewayInfo>,

    /// Pod CIDRs of the member cluster
    #[serde(rename = "podCIDRs", default, skip_serializing_if = "Vec::is_empty")]
    pub pod_cidrs: Vec<String>,
}

/// Externally published subset of a Gateway.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct GatewayInfo {
    #[serde(rename = "gatewayIP")]
    pub gateway_ip: String,
}

/// Name of the ClusterInfo export for a member cluster.
///
/// Pure function of the cluster ID so every reconciliation targets the same
/// object without remembering prior state.
#[must_use]
pub fn cluster_info_export_name(cluster_id: &str) -> String {
    format!("{cluster_id}-clusterinfo")
}

impl ResourceExport {
    /// Returns true once the leader has started deleting this object.
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
