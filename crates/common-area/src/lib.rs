//! Remote Common Area Client
//!
//! A remote common area is the shared namespace of a leader cluster where
//! member clusters publish `ResourceExport` objects.
//!
//! # Example
//!
//! ```no_run
//! use common_area::{KubeRemoteCommonArea, RemoteCommonArea};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let area = KubeRemoteCommonArea::from_kubeconfig(
//!     "leader-cluster",
//!     "mcops-leader",
//!     "/etc/mcops/leader.kubeconfig",
//!     Duration::from_secs(30),
//! ).await?;
//!
//! match area.get_resource_export("cluster-a-clusterinfo").await {
//!     Ok(export) => println!("found {:?}", export.spec.cluster_info),
//!     Err(e) if e.is_not_found() => println!("not exported yet"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Deadlines**: every remote call is bounded and fails with `Timeout`
//! - **Optimistic concurrency**: updates carry the `resourceVersion` they were read at
//! - **Registry**: one handle per leader, keyed by leader cluster ID
//! - **Mocking**: `MockRemoteCommonArea` behind the `test-util` feature

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod area_trait;
pub mod registry;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use area_trait::RemoteCommonArea;
pub use client::KubeRemoteCommonArea;
pub use error::{CommonAreaError, qualified_export_name};
pub use registry::RemoteCommonAreaRegistry;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockRemoteCommonArea;
