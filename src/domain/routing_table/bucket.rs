//! A single k-bucket: an ordered, capacity-bounded set of peer records.
//!
//! Head (index 0) is the least-recently-seen slot, tail is most-recently-seen.

use crate::domain::{NodeId, PeerRecord};

/// The result of inserting into a bucket, naming any side effect the
/// caller owes the network: an evicted head peer must be asynchronously
/// PING'd, and if it answers, re-submitted via a solicited `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// An existing entry was found and moved to the tail, address families merged.
    Merged,
    /// The bucket had room; the peer was appended at the tail.
    Appended,
    /// The bucket was full and the observation was unsolicited-proven
    /// (a matching PONG): the tail was evicted and the new peer inserted
    /// at `EVICTION_REINSERT_INDEX` from the head.
    EvictedSolicited { evicted: PeerRecord },
    /// The bucket was full and the observation was not liveness-proven:
    /// the head peer was popped out for a PING challenge and the new peer
    /// appended at the tail.
    ChallengeHead { challenge: PeerRecord },
}

#[derive(Debug, Clone, Default)]
pub struct KBucket {
    peers: Vec<PeerRecord>,
}

impl KBucket {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn is_full(&self, k: usize) -> bool {
        self.peers.len() >= k
    }

    /// Least-recently-seen peer (head).
    pub fn oldest(&self) -> Option<&PeerRecord> {
        self.peers.first()
    }

    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.peers.iter().any(|p| &p.id == id)
    }

    /// Implements the four-step insertion policy of a single bucket.
    pub fn insert(&mut self, peer: PeerRecord, solicited: bool, k: usize) -> InsertOutcome {
        if let Some(pos) = self.peers.iter().position(|p| p.id == peer.id) {
            let prior = self.peers.remove(pos);
            self.peers.push(peer.merge_stale(&prior));
            return InsertOutcome::Merged;
        }

        if self.peers.len() < k {
            self.peers.push(peer);
            return InsertOutcome::Appended;
        }

        if solicited {
            let evicted = self.peers.pop().expect("full bucket is non-empty");
            let idx = crate::config::EVICTION_REINSERT_INDEX.min(self.peers.len());
            self.peers.insert(idx, peer);
            InsertOutcome::EvictedSolicited { evicted }
        } else {
            let challenge = self.peers.remove(0);
            self.peers.push(peer);
            InsertOutcome::ChallengeHead { challenge }
        }
    }

    pub fn set_well_connected(&mut self, id: &NodeId) -> bool {
        if let Some(p) = self.peers.iter_mut().find(|p| &p.id == id) {
            p.well_connected = true;
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<PeerRecord> {
        let pos = self.peers.iter().position(|p| &p.id == id)?;
        Some(self.peers.remove(pos))
    }
}
