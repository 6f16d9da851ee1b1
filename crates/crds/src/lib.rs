//! MCops CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by member and leader clusters.

pub mod gateway;
pub mod resource_export;

pub use gateway::*;
pub use resource_export::*;

/// API group of every MCops CRD
pub const API_GROUP: &str = "multicluster.microscaler.io";
