//! Integration tests for the kube-backed remote common area
//!
//! These tests require a reachable leader cluster with the MCops CRDs installed.
//! Set LEADER_KUBECONFIG and LEADER_NAMESPACE environment variables to run.

use common_area::{KubeRemoteCommonArea, RemoteCommonArea};
use crds::{CLUSTER_INFO_KIND, ClusterInfo, GatewayInfo, ResourceExport, ResourceExportSpec};
use std::time::Duration;

async fn leader_area() -> KubeRemoteCommonArea {
    let kubeconfig = std::env::var("LEADER_KUBECONFIG")
        .expect("LEADER_KUBECONFIG environment variable must be set");
    let namespace = std::env::var("LEADER_NAMESPACE")
        .unwrap_or_else(|_| "mcops-leader".to_string());

    KubeRemoteCommonArea::from_kubeconfig("leader", namespace, kubeconfig, Duration::from_secs(30))
        .await
        .expect("Failed to create remote common area")
}

#[tokio::test]
#[ignore] // Requires a running leader cluster
async fn test_get_missing_export_is_not_found() {
    let area = leader_area().await;

    let err = area
        .get_resource_export("integration-missing-clusterinfo")
        .await
        .expect_err("export should not exist");
    assert!(err.is_not_found(), "expected NotFound, got {err}");
}

#[tokio::test]
#[ignore] // Requires a running leader cluster
async fn test_create_update_delete_export() {
    let area = leader_area().await;
    let name = "integration-test-clusterinfo";

    let export = ResourceExport::new(
        name,
        ResourceExportSpec {
            name: "integration-test".to_string(),
            namespace: "default".to_string(),
            kind: CLUSTER_INFO_KIND.to_string(),
            cluster_info: Some(ClusterInfo {
                cluster_id: "integration-test".to_string(),
                service_cidr: "10.96.0.0/12".to_string(),
                gateway_infos: vec![GatewayInfo { gateway_ip: "10.10.10.10".to_string() }],
                pod_cidrs: vec![],
            }),
        },
    );

    let mut created = area.create_resource_export(&export).await.expect("create failed");
    let again = area.create_resource_export(&export).await.expect_err("second create should fail");
    assert!(again.is_already_exists());

    if let Some(info) = created.spec.cluster_info.as_mut() {
        info.gateway_infos[0].gateway_ip = "10.10.10.12".to_string();
    }
    let updated = area.update_resource_export(&created).await.expect("update failed");
    assert_eq!(
        updated.spec.cluster_info.unwrap().gateway_infos[0].gateway_ip,
        "10.10.10.12"
    );

    area.delete_resource_export(name).await.expect("delete failed");
    let gone = area.delete_resource_export(name).await.expect_err("second delete should fail");
    assert!(gone.is_not_found());
}
