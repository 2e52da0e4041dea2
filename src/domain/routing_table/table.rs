//! The full bucket set owned by a local node.

use crate::domain::errors::RoutingTableError;
use crate::domain::routing_table::bucket::{InsertOutcome, KBucket};
use crate::domain::routing_table::config::NUM_BUCKETS;
use crate::domain::services::{bucket_index, find_k_closest};
use crate::domain::{NodeId, PeerRecord};

/// 256 k-buckets keyed by XOR distance from `local_id`.
///
/// Callers are expected to serialise access (e.g. behind a `tokio::sync::RwLock`
/// in the service layer); this type itself has no internal locking, matching
/// the "pure domain logic" boundary of the rest of `domain::`.
pub struct RoutingTable {
    local_id: NodeId,
    buckets: Vec<KBucket>,
    k: usize,
}

impl RoutingTable {
    pub fn new(local_id: NodeId, k: usize) -> Self {
        Self {
            local_id,
            buckets: (0..NUM_BUCKETS).map(|_| KBucket::new()).collect(),
            k,
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Inserts an observed peer per the four-step policy of §4.4. A no-op,
    /// reported as an error, when `peer.id` is the local node's id.
    pub fn insert(&mut self, peer: PeerRecord, solicited: bool) -> Result<InsertOutcome, RoutingTableError> {
        if peer.id == self.local_id {
            return Err(RoutingTableError::SelfInsert);
        }
        let b = bucket_index(&self.local_id, &peer.id);
        Ok(self.buckets[b].insert(peer, solicited, self.k))
    }

    /// Marks a peer as having proved liveness, without affecting its
    /// position. Used after a plain touch that isn't a full re-insertion
    /// (e.g. a PONG that arrived while the peer is already present).
    pub fn mark_well_connected(&mut self, id: &NodeId) -> bool {
        let b = bucket_index(&self.local_id, id);
        self.buckets[b].set_well_connected(id)
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<PeerRecord> {
        let b = bucket_index(&self.local_id, id);
        self.buckets[b].remove(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        let b = bucket_index(&self.local_id, id);
        self.buckets[b].contains(id)
    }

    /// `limit` peers nearest `key`, firewall-penalty-ordered (see
    /// `domain::services::sorting`).
    pub fn nearest(&self, key: &NodeId, limit: usize) -> Vec<PeerRecord> {
        let all: Vec<PeerRecord> = self.buckets.iter().flat_map(|b| b.peers().iter().cloned()).collect();
        find_k_closest(&all, key, limit)
    }

    pub fn bucket(&self, index: usize) -> &KBucket {
        &self.buckets[index]
    }

    pub fn total_peers(&self) -> usize {
        self.buckets.iter().map(KBucket::len).sum()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }
}
