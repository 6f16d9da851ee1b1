//! RemoteCommonArea trait for mocking
//!
//! The kube-backed `KubeRemoteCommonArea` implements this trait, and tests use
//! `MockRemoteCommonArea`.

use crate::error::CommonAreaError;
use crds::ResourceExport;

/// Handle to one leader cluster's shared namespace.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
/// Every call is bounded by the handle's deadline; a cancelled or timed-out call
/// performs no partial mutation visible to the caller beyond what the API
/// server itself committed.
#[async_trait::async_trait]
pub trait RemoteCommonArea: Send + Sync {
    /// ID of the leader cluster this handle points at
    fn cluster_id(&self) -> &str;

    /// Shared namespace in the leader cluster
    fn namespace(&self) -> &str;

    /// Read a ResourceExport; `CommonAreaError::NotFound` when absent.
    async fn get_resource_export(&self, name: &str) -> Result<ResourceExport, CommonAreaError>;

    /// Create a ResourceExport; `CommonAreaError::AlreadyExists` on name collision.
    async fn create_resource_export(&self, export: &ResourceExport) -> Result<ResourceExport, CommonAreaError>;

    /// Replace a ResourceExport; `CommonAreaError::Conflict` when its resourceVersion is stale.
    async fn update_resource_export(&self, export: &ResourceExport) -> Result<ResourceExport, CommonAreaError>;

    /// Delete a ResourceExport; `CommonAreaError::NotFound` when already gone.
    async fn delete_resource_export(&self, name: &str) -> Result<(), CommonAreaError>;
}
