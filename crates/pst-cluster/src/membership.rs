//! Cluster membership views.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Unique identifier for a cluster member.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The local process's view of the cluster.
pub trait MembershipView: Send + Sync {
    /// Number of members currently visible, the local node included
    fn current_size(&self) -> usize;

    /// Identifier of the local node
    fn local_node(&self) -> &NodeId;
}

/// Type alias for the member table shared by every handle of a cluster.
type SharedMembers<T> = Arc<RwLock<BTreeMap<NodeId, T>>>;

/// An in-process cluster.
///
/// Each member registers an endpoint `T` (for example the inbox other nodes
/// deliver replication payloads to). Handles are cheap to clone and all see
/// the same member table.
pub struct LocalCluster<T> {
    members: SharedMembers<T>,
}

impl<T> Clone for LocalCluster<T> {
    fn clone(&self) -> Self {
        Self {
            members: Arc::clone(&self.members),
        }
    }
}

impl<T: Clone + Send + Sync> LocalCluster<T> {
    pub fn new() -> Self {
        Self {
            members: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Add a member and return its view of the cluster.
    ///
    /// Joining twice with the same id replaces the earlier endpoint.
    pub fn join(&self, node: NodeId, endpoint: T) -> LocalView<T> {
        let previous = self.members.write().insert(node.clone(), endpoint);
        if previous.is_some() {
            warn!(node = %node, "member rejoined, replacing its endpoint");
        } else {
            debug!(node = %node, size = self.size(), "member joined");
        }
        LocalView {
            local: node,
            cluster: self.clone(),
        }
    }

    /// Remove a member; returns whether it was present
    pub fn leave(&self, node: &NodeId) -> bool {
        let removed = self.members.write().remove(node).is_some();
        if removed {
            debug!(node = %node, size = self.size(), "member left");
        }
        removed
    }

    pub fn size(&self) -> usize {
        self.members.read().len()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.read().contains_key(node)
    }

    /// All member ids, sorted
    pub fn members(&self) -> Vec<NodeId> {
        self.members.read().keys().cloned().collect()
    }

    /// Endpoints of every member except `node`
    pub fn peers_of(&self, node: &NodeId) -> Vec<(NodeId, T)> {
        self.members
            .read()
            .iter()
            .filter(|(id, _)| *id != node)
            .map(|(id, endpoint)| (id.clone(), endpoint.clone()))
            .collect()
    }
}

impl<T: Clone + Send + Sync> Default for LocalCluster<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One member's view of a [`LocalCluster`].
pub struct LocalView<T> {
    local: NodeId,
    cluster: LocalCluster<T>,
}

impl<T: Clone + Send + Sync> LocalView<T> {
    pub fn cluster(&self) -> &LocalCluster<T> {
        &self.cluster
    }

    /// Endpoints of every other member
    pub fn peers(&self) -> Vec<(NodeId, T)> {
        self.cluster.peers_of(&self.local)
    }

    /// Leave the cluster
    pub fn leave(&self) -> bool {
        self.cluster.leave(&self.local)
    }
}

impl<T: Clone + Send + Sync> MembershipView for LocalView<T> {
    fn current_size(&self) -> usize {
        self.cluster.size()
    }

    fn local_node(&self) -> &NodeId {
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_leave() {
        let cluster: LocalCluster<u32> = LocalCluster::new();

        let a = cluster.join(NodeId::new("node-1"), 1);
        assert_eq!(a.current_size(), 1);

        let b = cluster.join(NodeId::new("node-2"), 2);
        assert_eq!(a.current_size(), 2);
        assert_eq!(b.current_size(), 2);

        assert!(b.leave());
        assert!(!b.leave());
        assert_eq!(a.current_size(), 1);
    }

    #[test]
    fn test_peers_exclude_self() {
        let cluster: LocalCluster<&'static str> = LocalCluster::new();
        let a = cluster.join(NodeId::new("a"), "inbox-a");
        cluster.join(NodeId::new("b"), "inbox-b");
        cluster.join(NodeId::new("c"), "inbox-c");

        let peers = a.peers();
        let ids: Vec<_> = peers.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(peers[0].1, "inbox-b");
    }

    #[test]
    fn test_rejoin_replaces_endpoint() {
        let cluster: LocalCluster<u32> = LocalCluster::new();
        cluster.join(NodeId::new("a"), 1);
        let b = cluster.join(NodeId::new("b"), 2);
        cluster.join(NodeId::new("a"), 3);

        assert_eq!(cluster.size(), 2);
        assert_eq!(b.peers(), vec![(NodeId::new("a"), 3)]);
    }

    #[test]
    fn test_local_node() {
        let cluster: LocalCluster<()> = LocalCluster::new();
        let view = cluster.join(NodeId::new("node-7"), ());

        assert_eq!(view.local_node().to_string(), "node-7");
        assert!(cluster.contains(&NodeId::new("node-7")));
        assert_eq!(cluster.members(), vec![NodeId::new("node-7")]);
    }
}
