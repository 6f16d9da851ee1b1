//! Gateway CRD
//!
//! Local record of a member cluster's gateway Node addresses.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[kube(
    group = "multicluster.microscaler.io",
    version = "v1alpha1",
    kind = "Gateway",
    namespaced,
    printcolumn = r#"{"name":"Gateway IP","type":"string","jsonPath":".spec.gatewayIP"}"#,
    printcolumn = r#"{"name":"Internal IP","type":"string","jsonPath":".spec.internalIP"}"#
)]
pub struct GatewaySpec {
    /// IP reachable from other member clusters
    #[serde(rename = "gatewayIP", default)]
    pub gateway_ip: String,

    /// IP of the gateway Node inside the local cluster
    #[serde(rename = "internalIP", default)]
    pub internal_ip: String,
}
