//! Node configuration.

use crate::error::{NodeError, Result};
use pst_cluster::{BarrierConfig, NodeId};
use std::time::Duration;

/// Number of nodes the demo cluster expects.
pub const CLUSTER_SIZE: usize = 2;

/// Bicycles loaded by the first node.
pub const DEFAULT_BIKE_IDS: [&str; 3] = ["bike1", "bike2", "bike3"];

/// Configuration for a node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Numeric node id; the member name is `node-<id>`.
    pub node_id: u32,
    /// Members required before the node starts replicating.
    pub cluster_size: usize,
    /// Entries kept in memory before LRU eviction. `None` disables eviction.
    pub max_entries: Option<usize>,
    /// Keys of the bicycles this node works with.
    pub bike_ids: Vec<String>,
    /// Poll interval, timeout and backoff for the formation barrier.
    pub barrier: BarrierConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            cluster_size: CLUSTER_SIZE,
            max_entries: Some(1),
            bike_ids: DEFAULT_BIKE_IDS.iter().map(|id| id.to_string()).collect(),
            barrier: BarrierConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Cluster member name for this node
    pub fn member_id(&self) -> NodeId {
        NodeId::new(format!("node-{}", self.node_id))
    }

    /// Barrier configuration with the expected size taken from `cluster_size`
    pub fn barrier_config(&self) -> BarrierConfig {
        BarrierConfig {
            expected_size: self.cluster_size,
            ..self.barrier.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_size == 0 {
            return Err(NodeError::InvalidConfig(
                "cluster_size must be at least 1".to_string(),
            ));
        }
        if self.max_entries == Some(0) {
            return Err(NodeError::InvalidConfig(
                "max_entries must be at least 1 when eviction is enabled".to_string(),
            ));
        }
        if self.bike_ids.is_empty() {
            return Err(NodeError::InvalidConfig(
                "at least one bicycle id is required".to_string(),
            ));
        }
        self.barrier_config()
            .validate()
            .map_err(|e| NodeError::InvalidConfig(format!("barrier: {}", e)))

    }
}

/// Builder for node configuration.
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
        }
    }

    pub fn node_id(mut self, id: u32) -> Self {
        self.config.node_id = id;
        self
    }

    pub fn cluster_size(mut self, size: usize) -> Self {
        self.config.cluster_size = size;
        self
    }

    pub fn max_entries(mut self, max: Option<usize>) -> Self {
        self.config.max_entries = max;
        self
    }

    pub fn bike_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.bike_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.barrier.poll_interval = interval;
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.barrier.timeout = timeout;
        self
    }

    pub fn barrier(mut self, barrier: BarrierConfig) -> Self {
        self.config.barrier = barrier;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.config
    }
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pst_cluster::BarrierConfigBuilder;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();

        assert_eq!(config.cluster_size, 2);
        assert_eq!(config.max_entries, Some(1));
        assert_eq!(config.bike_ids, vec!["bike1", "bike2", "bike3"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = NodeConfigBuilder::new()
            .node_id(2)
            .cluster_size(3)
            .max_entries(None)
            .bike_ids(["a", "b"])
            .poll_interval(Duration::from_millis(50))
            .join_timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.member_id(), NodeId::new("node-2"));
        assert_eq!(config.max_entries, None);
        assert_eq!(config.bike_ids, vec!["a", "b"]);

        let barrier = config.barrier_config();
        assert_eq!(barrier.expected_size, 3);
        assert_eq!(barrier.poll_interval, Duration::from_millis(50));
        assert_eq!(barrier.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validation() {
        let zero_cluster = NodeConfigBuilder::new().cluster_size(0).build();
        assert!(matches!(
            zero_cluster.validate(),
            Err(NodeError::InvalidConfig(_))
        ));

        let zero_entries = NodeConfigBuilder::new().max_entries(Some(0)).build();
        assert!(zero_entries.validate().is_err());

        let no_bikes = NodeConfigBuilder::new()
            .bike_ids(Vec::<String>::new())
            .build();
        assert!(no_bikes.validate().is_err());
    }

    #[test]
    fn test_validation_covers_the_barrier() {
        let zero_poll = NodeConfigBuilder::new()
            .poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(
            zero_poll.validate(),
            Err(NodeError::InvalidConfig(_))
        ));

        let nan_backoff = NodeConfigBuilder::new()
            .barrier(
                BarrierConfigBuilder::new()
                    .backoff(f64::NAN, Duration::from_secs(1))
                    .build(),
            )
            .build();
        assert!(nan_backoff.validate().is_err());

        // An unrepresentable deadline means "wait forever", not a bad config.
        let forever = NodeConfigBuilder::new()
            .join_timeout(Duration::from_secs(u64::MAX))
            .build();
        assert!(forever.validate().is_ok());
    }
}
