//! Mock RemoteCommonArea for unit testing
//!
//! Stores ResourceExports in memory with API-server-like semantics:
//! - create on an existing name fails with `AlreadyExists`
//! - update with a stale `resourceVersion` fails with `Conflict`
//! - delete of an object carrying finalizers only sets `deletionTimestamp`
//!
//! Every call is recorded so tests can assert on remote writes.

use crate::area_trait::RemoteCommonArea;
use crate::error::{CommonAreaError, qualified_export_name};
use crds::ResourceExport;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// A recorded call against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `get_resource_export(name)`
    Get(String),
    /// `create_resource_export` of the named object
    Create(String),
    /// `update_resource_export` of the named object
    Update(String),
    /// `delete_resource_export(name)`
    Delete(String),
}

/// Remote operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// Reads
    Get,
    /// Creates
    Create,
    /// Updates
    Update,
    /// Deletes
    Delete,
}

/// Failure returned by the next call of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Deadline exceeded
    Timeout,
    /// Stale resourceVersion
    Conflict,
    /// Name collision
    AlreadyExists,
    /// Leader unreachable
    Unavailable(String),
}

/// Mock RemoteCommonArea for testing
#[derive(Clone)]
pub struct MockRemoteCommonArea {
    cluster_id: String,
    namespace: String,
    exports: Arc<Mutex<BTreeMap<String, ResourceExport>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    failures: Arc<Mutex<HashMap<MockOperation, MockFailure>>>,
    next_resource_version: Arc<Mutex<u64>>,
}

impl MockRemoteCommonArea {
    /// Create a new mock for a leader cluster's namespace
    pub fn new(cluster_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            exports: Arc::new(Mutex::new(BTreeMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            next_resource_version: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a ResourceExport to the mock store (for test setup, not recorded)
    pub fn add_export(&self, mut export: ResourceExport) {
        export.metadata.namespace = Some(self.namespace.clone());
        export.metadata.resource_version = Some(self.next_resource_version());
        self.exports.lock().unwrap().insert(export.name_any(), export);
    }

    /// Current stored ResourceExport (not recorded)
    pub fn export(&self, name: &str) -> Option<ResourceExport> {
        self.exports.lock().unwrap().get(name).cloned()
    }

    /// Number of stored ResourceExports
    pub fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }

    /// Make the next call of `operation` fail once
    pub fn fail_next(&self, operation: MockOperation, failure: MockFailure) {
        self.failures.lock().unwrap().insert(operation, failure);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that would mutate the leader (create, update, delete)
    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, MockCall::Get(_)))
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Remove objects whose deletion was pending, as the API server does once
    /// finalizers are released
    pub fn finish_pending_deletions(&self) {
        self.exports
            .lock()
            .unwrap()
            .retain(|_, export| export.metadata.deletion_timestamp.is_none());
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_resource_version(&self) -> String {
        let mut rv = self.next_resource_version.lock().unwrap();
        let current = *rv;
        *rv += 1;
        current.to_string()
    }

    fn injected_failure(&self, operation: MockOperation, name: &str) -> Option<CommonAreaError> {
        let failure = self.failures.lock().unwrap().remove(&operation)?;
        Some(match failure {
            MockFailure::Timeout => CommonAreaError::Timeout {
                operation: match operation {
                    MockOperation::Get => "get",
                    MockOperation::Create => "create",
                    MockOperation::Update => "update",
                    MockOperation::Delete => "delete",
                },
                seconds: 30,
            },
            MockFailure::Conflict => CommonAreaError::Conflict(format!(
                "Operation cannot be fulfilled on {}: the object has been modified",
                qualified_export_name(name)
            )),
            MockFailure::AlreadyExists => CommonAreaError::AlreadyExists(qualified_export_name(name)),
            MockFailure::Unavailable(message) => CommonAreaError::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message,
                reason: "ServiceUnavailable".to_string(),
                code: 503,
            })),
        })
    }
}

#[async_trait::async_trait]
impl RemoteCommonArea for MockRemoteCommonArea {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_resource_export(&self, name: &str) -> Result<ResourceExport, CommonAreaError> {
        self.record(MockCall::Get(name.to_string()));
        if let Some(e) = self.injected_failure(MockOperation::Get, name) {
            return Err(e);
        }
        self.exports
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| CommonAreaError::NotFound(qualified_export_name(name)))
    }

    async fn create_resource_export(&self, export: &ResourceExport) -> Result<ResourceExport, CommonAreaError> {
        let name = export.name_any();
        self.record(MockCall::Create(name.clone()));
        if let Some(e) = self.injected_failure(MockOperation::Create, &name) {
            return Err(e);
        }
        if self.exports.lock().unwrap().contains_key(&name) {
            return Err(CommonAreaError::AlreadyExists(qualified_export_name(&name)));
        }
        let mut stored = export.clone();
        stored.metadata.namespace = Some(self.namespace.clone());
        stored.metadata.resource_version = Some(self.next_resource_version());
        self.exports.lock().unwrap().insert(name, stored.clone());
        Ok(stored)
    }

    async fn update_resource_export(&self, export: &ResourceExport) -> Result<ResourceExport, CommonAreaError> {
        let name = export.name_any();
        self.record(MockCall::Update(name.clone()));
        if let Some(e) = self.injected_failure(MockOperation::Update, &name) {
            return Err(e);
        }
        let current_rv = match self.exports.lock().unwrap().get(&name) {
            Some(current) => current.resource_version(),
            None => return Err(CommonAreaError::NotFound(qualified_export_name(&name))),
        };
        if export.resource_version() != current_rv {
            return Err(CommonAreaError::Conflict(format!(
                "Operation cannot be fulfilled on {}: the object has been modified",
                qualified_export_name(&name)
            )));
        }
        let mut stored = export.clone();
        stored.metadata.resource_version = Some(self.next_resource_version());
        self.exports.lock().unwrap().insert(name, stored.clone());
        Ok(stored)
    }

    async fn delete_resource_export(&self, name: &str) -> Result<(), CommonAreaError> {
        self.record(MockCall::Delete(name.to_string()));
        if let Some(e) = self.injected_failure(MockOperation::Delete, name) {
            return Err(e);
        }
        let mut exports = self.exports.lock().unwrap();
        let Some(existing) = exports.get_mut(name) else {
            return Err(CommonAreaError::NotFound(qualified_export_name(name)));
        };
        if existing.finalizers().is_empty() {
            exports.remove(name);
        } else if existing.metadata.deletion_timestamp.is_none() {
            existing.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        }
        Ok(())
    }
}
