//! Scoped transactions.
//!
//! A [`Transaction`] stages entities, and on [`Transaction::commit`] extracts
//! each entity's pending delta, ships it to the peers and writes the entities
//! back to the store. A transaction that is dropped without a successful
//! commit rolls back: staged entities have their pending deltas discarded and
//! the store is left untouched, so a stale delta can never leak into a later
//! commit.
//!
//! Only one transaction per node is open at a time.

use crate::error::Result;
use crate::replication::{Outgoing, Replicable, Replicator, SharedStore};
use parking_lot::MutexGuard;
use pst_codec::PayloadKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What a successful commit did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Entities written to the local store
    pub keys: usize,
    /// Full-state payloads shipped
    pub full_payloads: usize,
    /// Delta payloads shipped
    pub delta_payloads: usize,
    /// Payload bytes encoded (per peer)
    pub bytes_shipped: usize,
    /// Peers reached by each payload
    pub peers: usize,
}

/// A write transaction on one node.
pub struct Transaction<'a, E: Replicable> {
    id: u64,
    store: &'a SharedStore<E>,
    replicator: &'a Replicator<E>,
    staged: BTreeMap<String, E>,
    finished: bool,
    _writer: MutexGuard<'a, ()>,
}

impl<'a, E: Replicable> Transaction<'a, E> {
    pub(crate) fn begin(
        id: u64,
        store: &'a SharedStore<E>,
        replicator: &'a Replicator<E>,
        writer: MutexGuard<'a, ()>,
    ) -> Self {
        debug!(tx = id, "transaction started");
        Self {
            id,
            store,
            replicator,
            staged: BTreeMap::new(),
            finished: false,
            _writer: writer,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read an entity, seeing this transaction's own writes
    pub fn get(&mut self, key: &str) -> Option<E> {
        if let Some(staged) = self.staged.get(key) {
            return Some(staged.clone());
        }
        self.store.write().get(key)
    }

    /// Stage an entity for commit
    pub fn put(&mut self, key: impl Into<String>, entity: E) {
        self.staged.insert(key.into(), entity);
    }

    /// Keys staged so far
    pub fn staged_keys(&self) -> impl Iterator<Item = &str> {
        self.staged.keys().map(String::as_str)
    }

    /// Ship the changes and make them visible locally.
    ///
    /// On error nothing is written to the local store and the transaction is
    /// rolled back when it goes out of scope. Peers that already received a
    /// payload keep it.
    pub fn commit(mut self) -> Result<CommitSummary> {
        let outgoing = match self.prepare() {
            Ok(outgoing) => outgoing,
            Err(e) => {
                warn!(tx = self.id, error = %e, "commit failed while encoding, rolling back");
                return Err(e);
            }
        };

        let mut summary = CommitSummary::default();
        for payload in &outgoing {
            match self.replicator.ship(payload) {
                Ok(peers) => summary.peers = summary.peers.max(peers),
                Err(e) => {
                    warn!(
                        tx = self.id,
                        key = %payload.key,
                        error = %e,
                        "commit failed while shipping, rolling back"
                    );
                    return Err(e);
                }
            }
            match payload.kind {
                PayloadKind::Full => summary.full_payloads += 1,
                PayloadKind::Delta => summary.delta_payloads += 1,
            }
            summary.bytes_shipped += payload.bytes.len();
        }

        let staged = std::mem::take(&mut self.staged);
        summary.keys = staged.len();
        let mut store = self.store.write();
        for (key, entity) in staged {
            store.put(key, entity);
        }
        drop(store);

        self.finished = true;
        info!(
            tx = self.id,
            keys = summary.keys,
            full = summary.full_payloads,
            deltas = summary.delta_payloads,
            bytes = summary.bytes_shipped,
            "transaction committed"
        );
        Ok(summary)
    }

    /// Abandon the transaction, discarding every staged delta
    pub fn rollback(mut self) {
        self.discard_staged();
        self.finished = true;
    }

    /// Extract every staged delta and encode the payloads
    fn prepare(&mut self) -> Result<Vec<Outgoing>> {
        let mut outgoing = Vec::with_capacity(self.staged.len());
        for (key, entity) in self.staged.iter_mut() {
            let first_replication = !self.store.read().contains_key(key);
            let delta = entity.extract_delta();
            let prepared = self
                .replicator
                .prepare(key, entity, delta, first_replication)?;
            outgoing.extend(prepared);
        }
        Ok(outgoing)
    }

    fn discard_staged(&mut self) {
        let discarded = self.staged.len();
        for entity in self.staged.values_mut() {
            entity.discard_delta();
        }
        self.staged.clear();
        debug!(tx = self.id, discarded, "transaction rolled back");
    }
}

impl<E: Replicable> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.discard_staged();
        }
    }
}
