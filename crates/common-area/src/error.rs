//! Remote common area errors

use thiserror::Error;

/// Errors that can occur when talking to a leader cluster's common area
#[derive(Debug, Error)]
pub enum CommonAreaError {
    /// The object does not exist in the leader namespace
    #[error("{0} not found")]
    NotFound(String),

    /// Create hit an object with the same name
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Update was based on a stale resourceVersion
    #[error("conflict: {0}")]
    Conflict(String),

    /// The call did not finish before its deadline
    #[error("remote call {operation} timed out after {seconds}s")]
    Timeout {
        /// Operation name (get, create, update, delete)
        operation: &'static str,
        /// Deadline in seconds
        seconds: u64,
    },

    /// Kubeconfig for the leader could not be loaded
    #[error("leader kubeconfig error: {0}")]
    Config(String),

    /// Object cannot be sent to the leader (e.g. missing name)
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Any other Kubernetes API failure
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

impl CommonAreaError {
    /// Read miss; callers treat this as "no object yet".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Create collided with an existing object.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Maps an API error from the leader to a typed variant.
    ///
    /// `qualified_name` is the `resource.group "name"` string used in messages.
    pub(crate) fn from_kube(error: kube::Error, qualified_name: &str) -> Self {
        match error {
            kube::Error::Api(ref e) if e.code == 404 => Self::NotFound(qualified_name.to_string()),
            kube::Error::Api(ref e) if e.code == 409 && e.reason == "AlreadyExists" => {
                Self::AlreadyExists(qualified_name.to_string())
            }
            kube::Error::Api(ref e) if e.code == 409 => Self::Conflict(e.message.clone()),
            other => Self::Kube(other),
        }
    }
}

/// `resourceexports.<group> "<name>"`, matching Kubernetes API error text.
#[must_use]
pub fn qualified_export_name(name: &str) -> String {
    format!("{}.{} \"{}\"", crds::RESOURCE_EXPORT_PLURAL, crds::API_GROUP, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_message_matches_api_server() {
        let err = CommonAreaError::AlreadyExists(qualified_export_name("cluster-a-clusterinfo"));
        assert_eq!(
            err.to_string(),
            "resourceexports.multicluster.microscaler.io \"cluster-a-clusterinfo\" already exists"
        );
        assert!(err.is_already_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_timeout_message() {
        let err = CommonAreaError::Timeout { operation: "get", seconds: 30 };
        assert_eq!(err.to_string(), "remote call get timed out after 30s");
    }
}
