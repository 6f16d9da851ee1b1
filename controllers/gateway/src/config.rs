//! Controller configuration.
//!
//! Read once at startup from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_REMOTE_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8080";

/// Gateway controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// ID of this member cluster (`CLUSTER_ID`)
    pub cluster_id: String,
    /// Namespace holding local Gateways (`WATCH_NAMESPACE`)
    pub namespace: String,
    /// ID of the leader cluster (`LEADER_CLUSTER_ID`)
    pub leader_cluster_id: String,
    /// Shared namespace in the leader (`LEADER_NAMESPACE`)
    pub leader_namespace: String,
    /// Kubeconfig for the leader (`LEADER_KUBECONFIG`)
    pub leader_kubeconfig: PathBuf,
    /// Static Service CIDR (`SERVICE_CIDR`); discovered at runtime when unset
    pub service_cidr: Option<String>,
    /// Pod CIDRs published with the ClusterInfo (`POD_CIDRS`, comma-separated)
    pub pod_cidrs: Vec<String>,
    /// Deadline for each call to the leader (`REMOTE_CALL_TIMEOUT_SECS`)
    pub remote_call_timeout: Duration,
    /// Listen address of the probe/metrics server (`PROBE_ADDR`)
    pub probe_addr: SocketAddr,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("{key} environment variable is required"))
            })
        };

        let remote_call_timeout = match optional("REMOTE_CALL_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    ControllerError::InvalidConfig(format!("REMOTE_CALL_TIMEOUT_SECS={raw}: {e}"))
                })?;
                if secs == 0 {
                    return Err(ControllerError::InvalidConfig(
                        "REMOTE_CALL_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_REMOTE_CALL_TIMEOUT_SECS),
        };

        let probe_addr_raw = optional("PROBE_ADDR").unwrap_or_else(|| DEFAULT_PROBE_ADDR.to_string());
        let probe_addr = probe_addr_raw
            .parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!("PROBE_ADDR={probe_addr_raw}: {e}")))?;

        let pod_cidrs = optional("POD_CIDRS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|cidr| !cidr.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            cluster_id: required("CLUSTER_ID")?,
            namespace: optional("WATCH_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            leader_cluster_id: required("LEADER_CLUSTER_ID")?,
            leader_namespace: required("LEADER_NAMESPACE")?,
            leader_kubeconfig: PathBuf::from(required("LEADER_KUBECONFIG")?),
            service_cidr: optional("SERVICE_CIDR"),
            pod_cidrs,
            remote_call_timeout,
            probe_addr,
        })
    }
}
