//! Reconciliation logic for the ClusterInfo ResourceExport.
//!
//! Every run is level-triggered: local Gateways are re-listed, the desired
//! export is recomputed, the leader's copy is re-read, and the smallest
//! mutation that makes the two agree is applied. Running twice with unchanged
//! inputs writes nothing the second time.

use crate::cluster_info::{build_cluster_info, cluster_info_export_spec};
use crate::error::ControllerError;
use crate::gateway_reader::GatewayReader;
use crate::service_cidr::ServiceCidrResolver;
use common_area::{CommonAreaError, RemoteCommonArea, RemoteCommonAreaRegistry, qualified_export_name};
use crds::{CLUSTER_INFO_KIND, ResourceExport, cluster_info_export_name};
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Label naming the member cluster that owns an export
pub const SOURCE_CLUSTER_LABEL: &str = "multicluster.microscaler.io/source-cluster-id";

/// Label naming the exported kind
pub const SOURCE_KIND_LABEL: &str = "multicluster.microscaler.io/source-kind";

/// Namespace/name of a Gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A change notification for a Gateway.
///
/// Only the key is carried; the reconciler always re-reads current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Created(ObjectKey),
    Updated(ObjectKey),
    Deleted(ObjectKey),
    /// Re-evaluate without a triggering object (initial sync, retries)
    Resync,
}

impl GatewayEvent {
    /// Key of the Gateway that triggered the event, if any
    #[must_use]
    pub fn key(&self) -> Option<&ObjectKey> {
        match self {
            Self::Created(key) | Self::Updated(key) | Self::Deleted(key) => Some(key),
            Self::Resync => None,
        }
    }
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(key) => write!(f, "created {key}"),
            Self::Updated(key) => write!(f, "updated {key}"),
            Self::Deleted(key) => write!(f, "deleted {key}"),
            Self::Resync => write!(f, "resync"),
        }
    }
}

/// What a successful reconciliation did to the leader's export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Deleted,
    Unchanged,
    /// No leader connected; nothing to export to
    Skipped,
}

impl SyncAction {
    /// Short label for metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
        }
    }
}

/// How the worker should follow up on a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Success,
    RetryAfter(Duration),
    /// Not worth retrying until something changes
    Fatal,
}

impl ReconcileOutcome {
    /// Classify a reconciliation result; `retry_delay` is only consulted for
    /// retryable failures.
    pub fn classify<F>(result: &Result<SyncAction, ControllerError>, retry_delay: F) -> Self
    where
        F: FnOnce() -> Duration,
    {
        match result {
            Ok(_) => Self::Success,
            Err(e) if e.is_retryable() => Self::RetryAfter(retry_delay()),
            Err(_) => Self::Fatal,
        }
    }
}

/// Reconciles local Gateways into the leader's ClusterInfo export.
pub struct Reconciler {
    cluster_id: String,
    namespace: String,
    pod_cidrs: Vec<String>,
    gateway_reader: Arc<dyn GatewayReader>,
    service_cidr: ServiceCidrResolver,
}

impl Reconciler {
    /// Creates a reconciler for the local cluster `cluster_id` watching `namespace`.
    pub fn new(
        cluster_id: String,
        namespace: String,
        pod_cidrs: Vec<String>,
        gateway_reader: Arc<dyn GatewayReader>,
        service_cidr: ServiceCidrResolver,
    ) -> Self {
        Self {
            cluster_id,
            namespace,
            pod_cidrs,
            gateway_reader,
            service_cidr,
        }
    }

    /// Handles one event against the current leader.
    pub async fn reconcile(
        &self,
        event: &GatewayEvent,
        registry: &RemoteCommonAreaRegistry,
    ) -> Result<SyncAction, ControllerError> {
        match event.key() {
            Some(key) => debug!("Reconciling ClusterInfo, triggered by Gateway {}", key),
            None => debug!("Reconciling ClusterInfo (resync)"),
        }
        let Some(area) = registry.leader() else {
            debug!("No leader cluster connected, skipping {}", event);
            return Ok(SyncAction::Skipped);
        };
        let action = self.sync_cluster_info(area.as_ref()).await?;
        match action {
            SyncAction::Unchanged | SyncAction::Skipped => {
                debug!("ClusterInfo export in leader {} is up to date", area.cluster_id());
            }
            _ => info!(
                "ClusterInfo export {} in leader {}: {}",
                cluster_info_export_name(&self.cluster_id),
                area.cluster_id(),
                action.as_str()
            ),
        }
        Ok(action)
    }

    /// Brings the leader's ClusterInfo export in line with local Gateways.
    pub async fn sync_cluster_info(&self, area: &dyn RemoteCommonArea) -> Result<SyncAction, ControllerError> {
        let facts = self.gateway_reader.list_gateways(&self.namespace).await?;
        let export_name = cluster_info_export_name(&self.cluster_id);

        let existing = match area.get_resource_export(&export_name).await {
            Ok(export) => Some(export),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if facts.is_empty() {
            return self.remove_export(area, &export_name, existing.as_ref()).await;
        }

        if existing.as_ref().is_some_and(ResourceExport::is_being_deleted) {
            warn!(
                "ResourceExport {} in leader {} is pending deletion, cannot export",
                export_name,
                area.cluster_id()
            );
            return Err(ControllerError::ConflictWithPendingDeletion(qualified_export_name(
                &export_name,
            )));
        }

        let service_cidr = self.service_cidr.resolve(&self.namespace).await?;
        let info = build_cluster_info(&self.cluster_id, &facts, &service_cidr, &self.pod_cidrs);
        let desired = cluster_info_export_spec(&self.cluster_id, &self.namespace, info);

        match existing {
            None => {
                let export = ResourceExport {
                    metadata: ObjectMeta {
                        name: Some(export_name.clone()),
                        namespace: Some(area.namespace().to_string()),
                        labels: Some(self.export_labels()),
                        ..Default::default()
                    },
                    spec: desired,
                };
                match area.create_resource_export(&export).await {
                    Ok(_) => Ok(SyncAction::Created),
                    Err(CommonAreaError::AlreadyExists(name)) => Err(ControllerError::AlreadyExists(name)),
                    Err(e) => Err(e.into()),
                }
            }
            Some(current) if current.spec == desired => Ok(SyncAction::Unchanged),
            Some(current) => {
                debug!("ResourceExport {} differs from local Gateways, updating", export_name);
                let mut updated = current;
                updated.spec = desired;
                area.update_resource_export(&updated).await?;
                Ok(SyncAction::Updated)
            }
        }
    }

    async fn remove_export(
        &self,
        area: &dyn RemoteCommonArea,
        export_name: &str,
        existing: Option<&ResourceExport>,
    ) -> Result<SyncAction, ControllerError> {
        match existing {
            None => Ok(SyncAction::Unchanged),
            Some(export) if export.is_being_deleted() => {
                debug!("ResourceExport {} is already being deleted", export_name);
                Ok(SyncAction::Unchanged)
            }
            Some(_) => match area.delete_resource_export(export_name).await {
                Ok(()) => Ok(SyncAction::Deleted),
                Err(e) if e.is_not_found() => Ok(SyncAction::Unchanged),
                Err(e) => Err(e.into()),
            },
        }
    }

    fn export_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (SOURCE_CLUSTER_LABEL.to_string(), self.cluster_id.clone()),
            (SOURCE_KIND_LABEL.to_string(), CLUSTER_INFO_KIND.to_string()),
        ])
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("cluster_id", &self.cluster_id)
            .field("namespace", &self.namespace)
            .field("pod_cidrs", &self.pod_cidrs)
            .finish()
    }
}
