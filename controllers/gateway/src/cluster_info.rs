//! ClusterInfo aggregation.
//!
//! Pure functions from local Gateway facts to the exported payload. Output is
//! independent of the order facts were listed or events arrived in.

use crate::gateway_reader::GatewayFact;
use crds::{CLUSTER_INFO_KIND, ClusterInfo, GatewayInfo, ResourceExportSpec};

/// Builds the ClusterInfo a member cluster exports.
///
/// Gateways are ordered by creation time, then namespace and name; a missing
/// creation timestamp sorts first.
#[must_use]
pub fn build_cluster_info(
    cluster_id: &str,
    facts: &[GatewayFact],
    service_cidr: &str,
    pod_cidrs: &[String],
) -> ClusterInfo {
    let mut ordered: Vec<&GatewayFact> = facts.iter().collect();
    ordered.sort_by(|a, b| {
        (&a.creation_timestamp, &a.namespace, &a.name).cmp(&(&b.creation_timestamp, &b.namespace, &b.name))
    });

    ClusterInfo {
        cluster_id: cluster_id.to_string(),
        service_cidr: service_cidr.to_string(),
        gateway_infos: ordered
            .into_iter()
            .map(|fact| GatewayInfo { gateway_ip: fact.gateway_ip.clone() })
            .collect(),
        pod_cidrs: pod_cidrs.to_vec(),
    }
}

/// Desired spec of the ClusterInfo ResourceExport.
#[must_use]
pub fn cluster_info_export_spec(cluster_id: &str, local_namespace: &str, info: ClusterInfo) -> ResourceExportSpec {
    ResourceExportSpec {
        name: cluster_id.to_string(),
        namespace: local_namespace.to_string(),
        kind: CLUSTER_INFO_KIND.to_string(),
        cluster_info: Some(info),
    }
}
