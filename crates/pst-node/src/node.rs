//! A replicating node.
//!
//! A node owns a keyed store, joins a [`ReplicaCluster`], and writes through
//! scoped [`Transaction`]s whose commits ship only the changed components to
//! the other members.

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::replication::{
    InboxStats, ReplicaCluster, ReplicaInbox, Replicable, Replicator, SharedStore,
};
use crate::store::{EntityStore, StoreStats};
use crate::transaction::{CommitSummary, Transaction};
use parking_lot::{Mutex, RwLock};
use pst_cluster::{BarrierOutcome, ClusterBarrier, MembershipView, NodeId};
use pst_codec::CodecRegistry;
use pst_core::Bicycle;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use ulid::Ulid;

/// A cluster of bicycle nodes.
pub type BicycleCluster = ReplicaCluster<Bicycle>;

/// A node holding replicated entities of type `E`.
pub struct Node<E: Replicable> {
    id: NodeId,
    config: NodeConfig,
    store: SharedStore<E>,
    inbox: Arc<ReplicaInbox<E>>,
    replicator: Replicator<E>,
    writer: Mutex<()>,
    next_tx: AtomicU64,
}

impl<E: Replicable> Node<E> {
    /// Create a node and join it to `cluster`.
    ///
    /// A node joining a cluster that already holds data receives a full copy
    /// of it from the existing members before it starts.
    pub fn start(
        config: NodeConfig,
        cluster: &ReplicaCluster<E>,
        registry: CodecRegistry<E>,
    ) -> Result<Self> {
        config.validate()?;

        let id = config.member_id();
        let registry = Arc::new(registry);
        let store: SharedStore<E> = Arc::new(RwLock::new(EntityStore::new(config.max_entries)));
        let inbox = Arc::new(ReplicaInbox::new(
            id.clone(),
            Arc::clone(&store),
            Arc::clone(&registry),
        ));
        let view = cluster.join(id.clone(), Arc::clone(&inbox));
        let replicator = Replicator::new(view, registry);

        let transferred = match replicator.pull_state(&inbox) {
            Ok(transferred) => transferred,
            Err(e) => {
                replicator.view().leave();
                return Err(e);
            }
        };

        info!(
            node = %id,
            max_entries = ?config.max_entries,
            transferred,
            "node started"
        );

        Ok(Self {
            id,
            config,
            store,
            inbox,
            replicator,
            writer: Mutex::new(()),
            next_tx: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Members currently visible to this node
    pub fn cluster_size(&self) -> usize {
        self.replicator.view().current_size()
    }

    /// Block until the configured cluster size is reached.
    ///
    /// A timeout is fatal for a node: replication without peers would
    /// silently diverge.
    pub async fn wait_for_cluster_to_form(&self) -> Result<BarrierOutcome> {
        let barrier = ClusterBarrier::new(self.config.barrier_config());
        let outcome = barrier.wait(self.replicator.view()).await;
        if outcome.is_formed() {
            Ok(outcome)
        } else {
            Err(NodeError::ClusterNotFormed {
                expected: self.config.cluster_size,
                observed: outcome.observed_size,
            })
        }
    }

    /// Open a write transaction; waits for any other open transaction
    pub fn begin(&self) -> Transaction<'_, E> {
        let writer = self.writer.lock();
        let id = self.next_tx.fetch_add(1, Ordering::Relaxed);
        Transaction::begin(id, &self.store, &self.replicator, writer)
    }

    /// Read an entry outside any transaction
    pub fn get(&self, key: &str) -> Option<E> {
        self.store.write().get(key)
    }

    /// Keys currently held in memory
    pub fn loaded_keys(&self) -> BTreeSet<String> {
        self.store.read().loaded_keys()
    }

    /// Every entry, loaded or evicted, sorted by key
    pub fn entries(&self) -> Vec<(String, E)> {
        self.store.read().entries()
    }

    /// Loaded and evicted entry counts
    pub fn store_stats(&self) -> StoreStats {
        self.store.read().stats()
    }

    /// Payloads received from other members
    pub fn inbox_stats(&self) -> InboxStats {
        self.inbox.stats()
    }

    /// Leave the cluster
    pub fn shutdown(&self) {
        if self.replicator.view().leave() {
            info!(node = %self.id, "node left the cluster");
        }
    }
}

/// Outcome of [`Node::update_bicycle_not_in_cache`].
#[derive(Clone, Debug)]
pub struct UpdateReport {
    pub bike_id: String,
    pub frame: String,
    pub fork: String,
    pub summary: CommitSummary,
}

impl Node<Bicycle> {
    /// Start a bicycle node with the standard codec registry
    pub fn start_bicycles(config: NodeConfig, cluster: &BicycleCluster) -> Result<Self> {
        Self::start(config, cluster, CodecRegistry::bicycles()?)
    }

    /// Put a default-equipped bicycle under every configured id, in one
    /// transaction.
    pub fn load_initial_data(&self) -> Result<CommitSummary> {
        let mut tx = self.begin();
        for bike_id in &self.config.bike_ids {
            let mut bike = Bicycle::new();
            bike.initialize_with_defaults();
            tx.put(bike_id.clone(), bike);
        }
        tx.commit()
    }

    /// Change the frame and fork of a bicycle that is not loaded in memory.
    ///
    /// Only those two components are replicated. Falls back to any bicycle
    /// when all of them are loaded, which means eviction is not bounded
    /// below the number of bicycles.
    pub fn update_bicycle_not_in_cache(&self) -> Result<UpdateReport> {
        let mut tx = self.begin();

        let loaded = self.loaded_keys();
        let mut candidates: Vec<&String> = self
            .config
            .bike_ids
            .iter()
            .filter(|id| !loaded.contains(*id))
            .collect();
        if candidates.is_empty() {
            warn!(
                node = %self.id,
                "every bicycle is loaded; make sure eviction is on and bounded below the number of bicycles"
            );
            candidates = self.config.bike_ids.iter().collect();
        }

        let bike_id = candidates
            .choose(&mut rand::thread_rng())
            .map(|id| id.to_string())
            .ok_or_else(|| NodeError::InvalidConfig("no bicycle ids configured".to_string()))?;

        let mut bike = tx
            .get(&bike_id)
            .ok_or_else(|| NodeError::KeyNotFound(bike_id.clone()))?;

        let suffix = Ulid::new();
        info!(node = %self.id, bike = %bike_id, "updating components: frame, fork");
        bike.set_frame(format!("New Frame_{}", suffix));
        bike.set_fork(format!("New Fork_{}", suffix));
        let frame = bike.frame().to_string();
        let fork = bike.fork().to_string();

        tx.put(bike_id.clone(), bike);
        let summary = tx.commit()?;

        Ok(UpdateReport {
            bike_id,
            frame,
            fork,
            summary,
        })
    }

    /// Render every bicycle for display
    pub fn render_contents(&self) -> String {
        let mut out = String::new();
        for (key, bike) in self.entries() {
            let _ = writeln!(out, "======== BIKE {} ========\n", key);
            let _ = writeln!(out, "{}", bike);
            let _ = writeln!(out, "=====================\n");
        }
        out
    }
}

impl<E: Replicable> Drop for Node<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
