//! # pst-node
//!
//! The node layer around the partial state transfer core: the collaborators a
//! tracked entity needs in order to actually be replicated.
//!
//! - [`store`] - keyed entity store with LRU eviction
//! - [`transaction`] - scoped write transactions that roll back unless committed
//! - [`replication`] - payload fan-out to peers and the receiving inbox
//! - [`node`] - a node wiring store, transactions, replication and the
//!   formation barrier together
//! - [`config`] - node configuration and builder
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust
//! use pst_node::{BicycleCluster, Node, NodeConfigBuilder};
//!
//! let cluster = BicycleCluster::new();
//! let node1 = Node::start_bicycles(NodeConfigBuilder::new().node_id(1).build(), &cluster).unwrap();
//! let node2 = Node::start_bicycles(NodeConfigBuilder::new().node_id(2).build(), &cluster).unwrap();
//!
//! node1.load_initial_data().unwrap();
//! let report = node1.update_bicycle_not_in_cache().unwrap();
//!
//! // Only frame and fork crossed the wire, yet node2 has the whole bicycle.
//! assert_eq!(report.summary.delta_payloads, 1);
//! assert_eq!(node2.get(&report.bike_id), node1.get(&report.bike_id));
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod replication;
pub mod store;
pub mod transaction;

// Re-exports for convenience
pub use config::{NodeConfig, NodeConfigBuilder, CLUSTER_SIZE, DEFAULT_BIKE_IDS};
pub use error::{NodeError, Result};
pub use node::{BicycleCluster, Node, UpdateReport};
pub use replication::{InboxStats, ReplicaCluster, ReplicaInbox, Replicable, Replicator};
pub use store::{EntityStore, StoreStats};
pub use transaction::{CommitSummary, Transaction};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{NodeConfig, NodeConfigBuilder};
    pub use crate::error::NodeError;
    pub use crate::node::{BicycleCluster, Node};
    pub use crate::transaction::Transaction;
    pub use pst_core::{Bicycle, BicycleField, DeltaAware};
}
