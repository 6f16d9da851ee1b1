//! Controller-specific error types.
//!
//! This module defines error types specific to the Gateway controller
//! that are not covered by upstream library errors.

use common_area::CommonAreaError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Gateway controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error (local cluster)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Remote common area error (leader cluster)
    #[error("Common area error: {0}")]
    CommonArea(#[from] CommonAreaError),

    /// Service CIDR is neither configured nor discoverable
    #[error("unable to determine Service CIDR: {0}")]
    ServiceCidrUnresolvable(String),

    /// Create raced with another creator of the same ResourceExport
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The existing ResourceExport is being deleted by the leader
    #[error("{0} already exists")]
    ConflictWithPendingDeletion(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Probe server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metric registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ControllerError {
    /// Whether the worker should requeue after a backoff.
    ///
    /// Only configuration errors wait for the next change; every remote,
    /// conflict and discovery failure is retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }

    /// Short label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Kube(_) => "kube",
            Self::CommonArea(_) => "common_area",
            Self::ServiceCidrUnresolvable(_) => "service_cidr_unresolvable",
            Self::AlreadyExists(_) => "already_exists",
            Self::ConflictWithPendingDeletion(_) => "pending_deletion",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Watch(_) => "watch",
            Self::Io(_) => "io",
            Self::Metrics(_) => "metrics",
        }
    }
}
