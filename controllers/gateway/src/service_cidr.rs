//! Service CIDR resolution.
//!
//! The ClusterIP range is taken from configuration when set. Otherwise it is
//! discovered from the cluster: first from the kubeadm ClusterConfiguration,
//! then by asking the API server to reject a Service with an invalid ClusterIP
//! and reading the valid range out of the rejection message.

use crate::error::ControllerError;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort, ServiceSpec};
use kube::api::{DeleteParams, ObjectMeta, PostParams};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const KUBEADM_CONFIG_NAMESPACE: &str = "kube-system";
const KUBEADM_CONFIG_NAME: &str = "kubeadm-config";
const KUBEADM_CLUSTER_CONFIGURATION_KEY: &str = "ClusterConfiguration";

const PROBE_SERVICE_NAME: &str = "invalid-svc";
const PROBE_CLUSTER_IP: &str = "0.0.0.0";
const VALID_RANGE_PREFIX: &str = "The range of valid IPs is ";

/// Cluster-level source of the Service CIDR.
#[async_trait::async_trait]
pub trait ServiceCidrSource: Send + Sync {
    /// Derive the Service CIDR; fails with `ServiceCidrUnresolvable`.
    async fn discover_service_cidr(&self, namespace: &str) -> Result<String, ControllerError>;
}

/// Returns `static_cidr` when configured, otherwise asks `source`.
pub async fn resolve_service_cidr(
    static_cidr: Option<&str>,
    source: &dyn ServiceCidrSource,
    namespace: &str,
) -> Result<String, ControllerError> {
    match static_cidr.filter(|cidr| !cidr.is_empty()) {
        Some(cidr) => Ok(cidr.to_string()),
        None => source.discover_service_cidr(namespace).await,
    }
}

/// Resolves the Service CIDR once per controller lifetime.
///
/// Only a successful discovery is cached; failures are retried on the next
/// reconciliation.
pub struct ServiceCidrResolver {
    static_cidr: Option<String>,
    source: Arc<dyn ServiceCidrSource>,
    discovered: OnceCell<String>,
}

impl ServiceCidrResolver {
    /// Creates a resolver with an optional static CIDR.
    pub fn new(static_cidr: Option<String>, source: Arc<dyn ServiceCidrSource>) -> Self {
        Self {
            static_cidr,
            source,
            discovered: OnceCell::new(),
        }
    }

    /// The Service CIDR to publish.
    pub async fn resolve(&self, namespace: &str) -> Result<String, ControllerError> {
        if let Some(cidr) = self.static_cidr.as_deref().filter(|cidr| !cidr.is_empty()) {
            return Ok(cidr.to_string());
        }
        let cidr = self
            .discovered
            .get_or_try_init(|| async {
                let cidr = resolve_service_cidr(None, self.source.as_ref(), namespace).await?;
                info!("Found Service ClusterIP range {}", cidr);
                Ok::<_, ControllerError>(cidr)
            })
            .await?;
        Ok(cidr.clone())
    }
}

/// Extracts the Service CIDR from the API server's rejection of the probe Service.
pub fn parse_service_cidr_from_error(message: &str) -> Result<String, ControllerError> {
    if message.contains(PROBE_CLUSTER_IP) {
        if let Some((_, range)) = message.split_once(VALID_RANGE_PREFIX) {
            let range = range.trim();
            if !range.is_empty() {
                return Ok(range.to_string());
            }
        }
    }
    Err(ControllerError::ServiceCidrUnresolvable(format!(
        "unable to parse error message: {message}"
    )))
}

/// Reads `networking.serviceSubnet` from a kubeadm ClusterConfiguration document.
pub fn parse_kubeadm_service_subnet(cluster_configuration: &str) -> Option<String> {
    let document: serde_yaml::Value = match serde_yaml::from_str(cluster_configuration) {
        Ok(document) => document,
        Err(e) => {
            warn!("Failed to parse kubeadm ClusterConfiguration: {}", e);
            return None;
        }
    };
    document
        .get("networking")?
        .get("serviceSubnet")?
        .as_str()
        .map(str::trim)
        .filter(|subnet| !subnet.is_empty())
        .map(str::to_string)
}

/// Discovers the Service CIDR through the local cluster's API server
pub struct KubeServiceCidrSource {
    client: Client,
}

impl KubeServiceCidrSource {
    /// Creates a source on the local cluster client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn from_kubeadm_config(&self) -> Option<String> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), KUBEADM_CONFIG_NAMESPACE);
        match api.get_opt(KUBEADM_CONFIG_NAME).await {
            Ok(Some(config_map)) => config_map
                .data
                .as_ref()
                .and_then(|data| data.get(KUBEADM_CLUSTER_CONFIGURATION_KEY))
                .and_then(|document| parse_kubeadm_service_subnet(document)),
            Ok(None) => {
                debug!("No {}/{} ConfigMap", KUBEADM_CONFIG_NAMESPACE, KUBEADM_CONFIG_NAME);
                None
            }
            Err(e) => {
                debug!("Cannot read {}/{}: {}", KUBEADM_CONFIG_NAMESPACE, KUBEADM_CONFIG_NAME, e);
                None
            }
        }
    }

    async fn from_invalid_service(&self, namespace: &str) -> Result<String, ControllerError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let probe = Service {
            metadata: ObjectMeta {
                name: Some(PROBE_SERVICE_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some(PROBE_CLUSTER_IP.to_string()),
                ports: Some(vec![ServicePort {
                    port: 443,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        match api.create(&PostParams::default(), &probe).await {
            Ok(_) => {
                warn!("Probe Service {}/{} was accepted, removing it", namespace, PROBE_SERVICE_NAME);
                if let Err(e) = api.delete(PROBE_SERVICE_NAME, &DeleteParams::default()).await {
                    warn!("Failed to delete probe Service {}/{}: {}", namespace, PROBE_SERVICE_NAME, e);
                }
                Err(ControllerError::ServiceCidrUnresolvable(
                    "expected a specific error but none was returned".to_string(),
                ))
            }
            Err(kube::Error::Api(e)) => parse_service_cidr_from_error(&e.message),
            Err(e) => Err(ControllerError::ServiceCidrUnresolvable(format!(
                "probe Service creation failed: {e}"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ServiceCidrSource for KubeServiceCidrSource {
    async fn discover_service_cidr(&self, namespace: &str) -> Result<String, ControllerError> {
        if let Some(cidr) = self.from_kubeadm_config().await {
            return Ok(cidr);
        }
        self.from_invalid_service(namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingServiceCidrSource, StaticServiceCidrSource};

    #[test]
    fn test_parse_rejection_message() {
        let message = "Service \"invalid-svc\" is invalid: spec.clusterIPs: Invalid value: []string{\"0.0.0.0\"}: \
                       failed to allocate IP 0.0.0.0: provided IP is not in the valid range. \
                       The range of valid IPs is 10.96.0.0/12";
        assert_eq!(parse_service_cidr_from_error(message).unwrap(), "10.96.0.0/12");
    }

    #[test]
    fn test_parse_unrelated_message() {
        let err = parse_service_cidr_from_error("services \"invalid-svc\" is forbidden").unwrap_err();
        assert!(matches!(err, ControllerError::ServiceCidrUnresolvable(ref msg)
            if msg.starts_with("unable to parse error message")));
    }

    #[test]
    fn test_parse_message_without_range() {
        assert!(parse_service_cidr_from_error("spec.clusterIPs: Invalid value: 0.0.0.0").is_err());
    }

    #[test]
    fn test_parse_kubeadm_configuration() {
        let document = "apiVersion: kubeadm.k8s.io/v1beta3\n\
                        kind: ClusterConfiguration\n\
                        networking:\n  \
                          dnsDomain: cluster.local\n  \
                          podSubnet: 10.244.0.0/16\n  \
                          serviceSubnet: 10.96.0.0/12\n";
        assert_eq!(parse_kubeadm_service_subnet(document).as_deref(), Some("10.96.0.0/12"));
        assert_eq!(parse_kubeadm_service_subnet("kind: ClusterConfiguration\n"), None);
        assert_eq!(parse_kubeadm_service_subnet(": not yaml : ["), None);
    }

    #[tokio::test]
    async fn test_static_cidr_skips_discovery() {
        let source = FailingServiceCidrSource::default();
        let cidr = resolve_service_cidr(Some("10.96.0.0/12"), &source, "default").await.unwrap();
        assert_eq!(cidr, "10.96.0.0/12");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_static_cidr_discovers() {
        let source = FailingServiceCidrSource::default();
        let err = resolve_service_cidr(Some(""), &source, "default").await.unwrap_err();
        assert!(matches!(err, ControllerError::ServiceCidrUnresolvable(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolver_caches_discovered_cidr() {
        let source = Arc::new(StaticServiceCidrSource::new("10.100.0.0/16"));
        let resolver = ServiceCidrResolver::new(None, source.clone());
        assert_eq!(resolver.resolve("default").await.unwrap(), "10.100.0.0/16");
        assert_eq!(resolver.resolve("default").await.unwrap(), "10.100.0.0/16");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolver_does_not_cache_failures() {
        let source = Arc::new(FailingServiceCidrSource::default());
        let resolver = ServiceCidrResolver::new(None, source.clone());
        assert!(resolver.resolve("default").await.is_err());
        assert!(resolver.resolve("default").await.is_err());
        assert_eq!(source.calls(), 2);
    }
}
