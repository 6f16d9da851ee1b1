//! Registry of remote common areas, one per leader cluster.
//!
//! The registry is owned by the controller and handed to the reconciler on each
//! call; nothing here is global.

use crate::area_trait::RemoteCommonArea;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Leader cluster ID -> remote common area handle
#[derive(Default)]
pub struct RemoteCommonAreaRegistry {
    areas: RwLock<BTreeMap<String, Arc<dyn RemoteCommonArea>>>,
}

impl RemoteCommonAreaRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handle for its leader cluster
    pub fn insert(&self, area: Arc<dyn RemoteCommonArea>) {
        let cluster_id = area.cluster_id().to_string();
        match self.areas.write() {
            Ok(mut areas) => {
                if areas.insert(cluster_id.clone(), area).is_some() {
                    info!("Replaced remote common area for leader {}", cluster_id);
                } else {
                    info!("Registered remote common area for leader {}", cluster_id);
                }
            }
            Err(e) => warn!("Failed to lock remote common area registry: {}", e),
        }
    }

    /// Drop the handle for a leader cluster
    pub fn remove(&self, cluster_id: &str) -> Option<Arc<dyn RemoteCommonArea>> {
        self.areas.write().ok().and_then(|mut areas| areas.remove(cluster_id))
    }

    /// Handle for a specific leader cluster
    #[must_use]
    pub fn get(&self, cluster_id: &str) -> Option<Arc<dyn RemoteCommonArea>> {
        self.areas.read().ok().and_then(|areas| areas.get(cluster_id).cloned())
    }

    /// The leader to export to.
    ///
    /// A member belongs to one ClusterSet and therefore exports to one leader;
    /// with several registered the lowest cluster ID is chosen so the choice is
    /// stable across reconciliations.
    #[must_use]
    pub fn leader(&self) -> Option<Arc<dyn RemoteCommonArea>> {
        self.areas.read().ok().and_then(|areas| areas.values().next().cloned())
    }

    /// Registered leader cluster IDs, sorted
    #[must_use]
    pub fn cluster_ids(&self) -> Vec<String> {
        self.areas
            .read()
            .map(|areas| areas.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for RemoteCommonAreaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCommonAreaRegistry")
            .field("leaders", &self.cluster_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRemoteCommonArea;

    #[test]
    fn test_empty_registry_has_no_leader() {
        let registry = RemoteCommonAreaRegistry::new();
        assert!(registry.leader().is_none());
        assert!(registry.cluster_ids().is_empty());
    }

    #[test]
    fn test_leader_is_stable_with_several_areas() {
        let registry = RemoteCommonAreaRegistry::new();
        registry.insert(Arc::new(MockRemoteCommonArea::new("leader-b", "mcops")));
        registry.insert(Arc::new(MockRemoteCommonArea::new("leader-a", "mcops")));

        let leader = registry.leader().unwrap();
        assert_eq!(leader.cluster_id(), "leader-a");
        assert_eq!(registry.cluster_ids(), vec!["leader-a", "leader-b"]);
    }

    #[test]
    fn test_insert_replaces_and_remove_drops() {
        let registry = RemoteCommonAreaRegistry::new();
        registry.insert(Arc::new(MockRemoteCommonArea::new("leader", "ns-1")));
        registry.insert(Arc::new(MockRemoteCommonArea::new("leader", "ns-2")));
        assert_eq!(registry.get("leader").unwrap().namespace(), "ns-2");

        assert!(registry.remove("leader").is_some());
        assert!(registry.get("leader").is_none());
        assert!(registry.remove("leader").is_none());
    }
}
