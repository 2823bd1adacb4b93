//! Delta replication between in-process nodes.
//!
//! The sending side turns each committed entity into one payload: the full
//! state for a key the cluster has never seen, the extracted delta otherwise.
//! The payload is encoded once and delivered to every peer's
//! [`ReplicaInbox`], which decodes it through the type-id registry and applies
//! it to the local store.
//!
//! ```text
//! commit ──► extract_delta ──► registry.encode ──► peer inbox ──► registry.decode
//!                                                                   │
//!                                          Full: put   ◄────────────┤
//!                                          Delta: get + apply + put ◄┘
//! ```

use crate::error::{NodeError, Result};
use crate::store::EntityStore;
use parking_lot::RwLock;
use pst_cluster::{LocalCluster, LocalView, MembershipView, NodeId};
use pst_codec::{CodecRegistry, Payload, PayloadKind};
use pst_core::{Delta, DeltaAware};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Entities the node layer can store and replicate.
pub trait Replicable: DeltaAware + Clone + Default + Send + Sync + 'static {}

impl<T: DeltaAware + Clone + Default + Send + Sync + 'static> Replicable for T {}

/// Store shared between a node and its inbox.
pub type SharedStore<E> = Arc<RwLock<EntityStore<E>>>;

/// Cluster whose member endpoints are replica inboxes.
pub type ReplicaCluster<E> = LocalCluster<Arc<ReplicaInbox<E>>>;

/// Counters for payloads received by an inbox.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxStats {
    pub full_payloads: u64,
    pub delta_payloads: u64,
    pub bytes_received: u64,
}

/// Receiving end of replication for one node.
pub struct ReplicaInbox<E: Replicable> {
    node: NodeId,
    store: SharedStore<E>,
    registry: Arc<CodecRegistry<E>>,
    full_payloads: AtomicU64,
    delta_payloads: AtomicU64,
    bytes_received: AtomicU64,
}

impl<E: Replicable> ReplicaInbox<E> {
    pub fn new(node: NodeId, store: SharedStore<E>, registry: Arc<CodecRegistry<E>>) -> Self {
        Self {
            node,
            store,
            registry,
            full_payloads: AtomicU64::new(0),
            delta_payloads: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Decode a payload and apply it to the local store.
    ///
    /// A delta for a key this node has never seen is applied to a fresh
    /// entity.
    pub fn deliver(&self, from: &NodeId, key: &str, bytes: &[u8]) -> Result<PayloadKind> {
        let payload = self.registry.decode(bytes)?;
        let kind = payload.kind();

        let mut store = self.store.write();
        match payload {
            Payload::Full(entity) => {
                store.put(key, entity);
                self.full_payloads.fetch_add(1, Ordering::Relaxed);
            }
            Payload::Delta(delta) => {
                let mut entity = match store.get(key) {
                    Some(entity) => entity,
                    None => {
                        warn!(
                            node = %self.node,
                            from = %from,
                            key,
                            "delta for a key without state, applying to an empty entity"
                        );
                        E::default()
                    }
                };
                entity.apply_delta(&delta);
                store.put(key, entity);
                self.delta_payloads.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.bytes_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        debug!(
            node = %self.node,
            from = %from,
            key,
            kind = ?kind,
            bytes = bytes.len(),
            "applied replicated payload"
        );
        Ok(kind)
    }

    /// Encode every entry, loaded or evicted, as a full-state payload
    pub fn export_state(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let entries = self.store.read().entries();
        entries
            .into_iter()
            .map(|(key, entity)| -> Result<(String, Vec<u8>)> {
                let bytes = self.registry.encode(&Payload::Full(entity))?;
                Ok((key, bytes))
            })
            .collect()
    }

    pub fn stats(&self) -> InboxStats {
        InboxStats {
            full_payloads: self.full_payloads.load(Ordering::Relaxed),
            delta_payloads: self.delta_payloads.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// An encoded payload waiting to be delivered.
#[derive(Clone, Debug)]
pub struct Outgoing {
    pub key: String,
    pub kind: PayloadKind,
    pub bytes: Vec<u8>,
}

/// Sending end of replication for one node.
pub struct Replicator<E: Replicable> {
    view: LocalView<Arc<ReplicaInbox<E>>>,
    registry: Arc<CodecRegistry<E>>,
}

impl<E: Replicable> Replicator<E> {
    pub fn new(view: LocalView<Arc<ReplicaInbox<E>>>, registry: Arc<CodecRegistry<E>>) -> Self {
        Self { view, registry }
    }

    pub fn view(&self) -> &LocalView<Arc<ReplicaInbox<E>>> {
        &self.view
    }

    /// Encode what has to cross the wire for one committed entity.
    ///
    /// Returns `None` when an already-replicated key has no changes.
    pub fn prepare(
        &self,
        key: &str,
        entity: &E,
        delta: Delta<E::Field>,
        first_replication: bool,
    ) -> Result<Option<Outgoing>> {
        let payload = if first_replication {
            Payload::Full(entity.clone())
        } else if delta.is_empty() {
            trace!(key, "nothing changed, skipping replication");
            return Ok(None);
        } else {
            Payload::Delta(delta)
        };

        let kind = payload.kind();
        let bytes = self.registry.encode(&payload)?;
        Ok(Some(Outgoing {
            key: key.to_string(),
            kind,
            bytes,
        }))
    }

    /// State transfer for a joining member: copy every peer's entries into
    /// `inbox` as full payloads. Returns the number of payloads applied.
    pub fn pull_state(&self, inbox: &ReplicaInbox<E>) -> Result<usize> {
        let mut applied = 0;
        for (peer, remote) in self.view.peers() {
            let failed = |e: NodeError| NodeError::ReplicationFailed {
                node: peer.to_string(),
                reason: e.to_string(),
            };
            let state = remote.export_state().map_err(&failed)?;
            for (key, bytes) in &state {
                inbox.deliver(&peer, key, bytes).map_err(&failed)?;
                applied += 1;
            }
            debug!(
                node = %inbox.node(),
                from = %peer,
                entries = state.len(),
                "received state transfer"
            );
        }
        Ok(applied)
    }

    /// Deliver a payload to every peer; returns how many received it
    pub fn ship(&self, outgoing: &Outgoing) -> Result<usize> {
        let local = self.view.local_node();
        let peers = self.view.peers();
        for (peer, inbox) in &peers {
            inbox
                .deliver(local, &outgoing.key, &outgoing.bytes)
                .map_err(|e| NodeError::ReplicationFailed {
                    node: peer.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(peers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pst_core::{Bicycle, BicycleDelta, BicycleField};

    fn inbox(name: &str) -> Arc<ReplicaInbox<Bicycle>> {
        Arc::new(ReplicaInbox::new(
            NodeId::new(name),
            Arc::new(RwLock::new(EntityStore::unbounded())),
            Arc::new(CodecRegistry::bicycles().unwrap()),
        ))
    }

    fn equipped() -> Bicycle {
        let mut bike = Bicycle::new();
        bike.initialize_with_defaults();
        bike.extract_delta();
        bike
    }

    #[test]
    fn test_pull_state_copies_every_peer_entry() {
        let cluster: ReplicaCluster<Bicycle> = LocalCluster::new();
        let old = inbox("node-1");
        old.store.write().put("bike1", equipped());
        old.store.write().put("bike2", equipped());
        cluster.join(NodeId::new("node-1"), Arc::clone(&old));

        let joiner = inbox("node-2");
        let view = cluster.join(NodeId::new("node-2"), Arc::clone(&joiner));
        let registry = Arc::new(CodecRegistry::bicycles().unwrap());
        let replicator = Replicator::new(view, registry);

        assert_eq!(replicator.pull_state(&joiner).unwrap(), 2);
        assert_eq!(joiner.store.write().get("bike1"), Some(equipped()));
        assert_eq!(joiner.stats().full_payloads, 2);
        assert_eq!(joiner.stats().delta_payloads, 0);
    }

    #[test]
    fn test_delta_without_state_applies_to_empty_entity() {
        let receiver = inbox("node-2");
        let registry = CodecRegistry::<Bicycle>::bicycles().unwrap();
        let mut delta = BicycleDelta::new();
        delta.record(BicycleField::Crank, "Saint");
        let bytes = registry.encode(&Payload::Delta(delta)).unwrap();

        let kind = receiver
            .deliver(&NodeId::new("node-1"), "bike9", &bytes)
            .unwrap();

        assert_eq!(kind, PayloadKind::Delta);
        let bike = receiver.store.write().get("bike9").unwrap();
        assert_eq!(bike.crank(), "Saint");
        assert_eq!(bike.frame(), "");
    }
}
