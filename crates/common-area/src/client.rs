//! Kube-backed remote common area
//!
//! Talks to the leader cluster's API server with its own `kube::Client`, built
//! from a kubeconfig for the leader.

use crate::area_trait::RemoteCommonArea;
use crate::error::{CommonAreaError, qualified_export_name};
use crds::ResourceExport;
use kube::api::{DeleteParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Remote common area backed by a leader cluster's API server
pub struct KubeRemoteCommonArea {
    cluster_id: String,
    namespace: String,
    api: Api<ResourceExport>,
    call_timeout: Duration,
}

impl KubeRemoteCommonArea {
    /// Create a handle from an existing client for the leader cluster
    ///
    /// # Arguments
    /// * `cluster_id` - ID of the leader cluster
    /// * `namespace` - shared namespace in the leader
    /// * `client` - client authenticated against the leader
    /// * `call_timeout` - deadline applied to every remote call
    pub fn new(
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
        client: Client,
        call_timeout: Duration,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            cluster_id: cluster_id.into(),
            api: Api::namespaced(client, &namespace),
            namespace,
            call_timeout,
        }
    }

    /// Create a handle from a kubeconfig file for the leader cluster
    pub async fn from_kubeconfig(
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
        kubeconfig_path: impl AsRef<Path>,
        call_timeout: Duration,
    ) -> Result<Self, CommonAreaError> {
        let path = kubeconfig_path.as_ref();
        let kubeconfig = Kubeconfig::read_from(path)
            .map_err(|e| CommonAreaError::Config(format!("{}: {e}", path.display())))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| CommonAreaError::Config(format!("{}: {e}", path.display())))?;
        let client = Client::try_from(config)?;
        Ok(Self::new(cluster_id, namespace, client, call_timeout))
    }

    /// Run one API call under the handle's deadline
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, CommonAreaError>
    where
        F: Future<Output = Result<T, CommonAreaError>>,
    {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_elapsed| CommonAreaError::Timeout {
                operation,
                seconds: self.call_timeout.as_secs(),
            })?
    }
}

#[async_trait::async_trait]
impl RemoteCommonArea for KubeRemoteCommonArea {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_resource_export(&self, name: &str) -> Result<ResourceExport, CommonAreaError> {
        debug!("Getting ResourceExport {}/{} from leader {}", self.namespace, name, self.cluster_id);
        self.bounded("get", async {
            self.api
                .get(name)
                .await
                .map_err(|e| CommonAreaError::from_kube(e, &qualified_export_name(name)))
        })
        .await
    }

    async fn create_resource_export(&self, export: &ResourceExport) -> Result<ResourceExport, CommonAreaError> {
        let name = export.name_any();
        debug!("Creating ResourceExport {}/{} in leader {}", self.namespace, name, self.cluster_id);
        self.bounded("create", async {
            self.api
                .create(&PostParams::default(), export)
                .await
                .map_err(|e| CommonAreaError::from_kube(e, &qualified_export_name(&name)))
        })
        .await
    }

    async fn update_resource_export(&self, export: &ResourceExport) -> Result<ResourceExport, CommonAreaError> {
        let name = export.name_any();
        if export.resource_version().is_none() {
            return Err(CommonAreaError::InvalidObject(format!(
                "ResourceExport {name} has no resourceVersion; read it before updating"
            )));
        }
        debug!("Updating ResourceExport {}/{} in leader {}", self.namespace, name, self.cluster_id);
        self.bounded("update", async {
            self.api
                .replace(&name, &PostParams::default(), export)
                .await
                .map_err(|e| CommonAreaError::from_kube(e, &qualified_export_name(&name)))
        })
        .await
    }

    async fn delete_resource_export(&self, name: &str) -> Result<(), CommonAreaError> {
        debug!("Deleting ResourceExport {}/{} from leader {}", self.namespace, name, self.cluster_id);
        self.bounded("delete", async {
            self.api
                .delete(name, &DeleteParams::default())
                .await
                .map(|_| ())
                .map_err(|e| CommonAreaError::from_kube(e, &qualified_export_name(name)))
        })
        .await
    }
}
