//! `RpcState`: the outstanding-request table correlating a `FIND_NODE` /
//! `FIND_VALUE` reply (or an eviction-challenge `PONG`) back to the
//! shortlist or routing-table operation that is waiting for it.
//!
//! Keyed by `hashed_rpc_id = H(rpc_id ∥ network_id)` so a peer outside the
//! overlay cannot synthesise a reply that resolves an entry it never saw.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::domain::{NodeId, PeerRecord, Shortlist};
use crate::wire::{hashed_rpc_id, RpcId};

/// What an outstanding request resolves into.
#[derive(Clone)]
pub enum Waiter {
    /// A lookup iteration awaiting `FOUND_NODES` / `FOUND_VALUE`.
    Lookup(Arc<Shortlist>),
    /// A bucket eviction challenge awaiting a liveness-proving `PONG`;
    /// resolved by presence alone, no payload needed.
    EvictionChallenge,
}

struct Entry {
    started_at: Instant,
    waiter: Waiter,
}

#[derive(Default)]
pub struct RpcTable {
    inner: Mutex<HashMap<[u8; 32], Entry>>,
}

impl RpcTable {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    pub async fn register(&self, rpc_id: &RpcId, waiter: Waiter) {
        self.inner.lock().await.insert(hashed_rpc_id(rpc_id), Entry { started_at: Instant::now(), waiter });
    }

    /// One-shot resolution: removes and returns the waiter, if any.
    async fn take(&self, rpc_id: &RpcId) -> Option<Waiter> {
        self.inner.lock().await.remove(&hashed_rpc_id(rpc_id)).map(|e| e.waiter)
    }

    /// Resolves a `FOUND_NODES` reply against its lookup waiter.
    pub async fn resolve_found_nodes(&self, rpc_id: &RpcId, nodes: Vec<PeerRecord>) -> bool {
        match self.take(rpc_id).await {
            Some(Waiter::Lookup(shortlist)) => {
                shortlist.update(nodes);
                true
            }
            Some(Waiter::EvictionChallenge) => false,
            None => false,
        }
    }

    /// Resolves a `FOUND_VALUE` reply against its lookup waiter.
    pub async fn resolve_found_value(&self, rpc_id: &RpcId, value: Vec<u8>) -> bool {
        match self.take(rpc_id).await {
            Some(Waiter::Lookup(shortlist)) => {
                shortlist.set_complete(Some(value));
                true
            }
            Some(Waiter::EvictionChallenge) => false,
            None => false,
        }
    }

    /// Resolves a liveness-proving `PONG` against an eviction challenge,
    /// returning whether one was outstanding for this `rpc_id`.
    pub async fn resolve_eviction_challenge(&self, rpc_id: &RpcId) -> bool {
        matches!(self.take(rpc_id).await, Some(Waiter::EvictionChallenge))
    }

    /// Returns true if some waiter (of any kind) is outstanding for `rpc_id`,
    /// without consuming it — used by the PONG handler to decide whether a
    /// reply is solicited (§4.7's `is_rpc_ping` check) before routing it to
    /// the more specific resolver.
    pub async fn is_outstanding(&self, rpc_id: &NodeId) -> bool {
        let bytes: RpcId = *rpc_id.as_bytes();
        self.inner.lock().await.contains_key(&hashed_rpc_id(&bytes))
    }

    /// Removes entries older than `timeout` (§4.8 RPC-state GC). Returns how
    /// many were reaped.
    pub async fn gc(&self, timeout: Duration) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|_, entry| entry.started_at.elapsed() < timeout);
        before - inner.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PeerAddr;

    fn rpc_id(b: u8) -> RpcId {
        [b; 32]
    }

    #[tokio::test]
    async fn test_resolve_found_nodes_updates_shortlist() {
        let table = RpcTable::new();
        let shortlist = Arc::new(Shortlist::new(20, NodeId::new([0u8; 32]), NodeId::new([0xffu8; 32])));
        table.register(&rpc_id(1), Waiter::Lookup(shortlist.clone())).await;

        let peer = PeerRecord::new(NodeId::new([1u8; 32]), 2000, PeerAddr::v4_only([1, 1, 1, 1]));
        let resolved = table.resolve_found_nodes(&rpc_id(1), vec![peer]).await;
        assert!(resolved);
        assert_eq!(shortlist.results().len(), 1);
        assert_eq!(table.len().await, 0);
    }

    #[tokio::test]
    async fn test_resolve_unknown_rpc_id_is_noop() {
        let table = RpcTable::new();
        assert!(!table.resolve_found_nodes(&rpc_id(9), vec![]).await);
    }

    #[tokio::test]
    async fn test_gc_reaps_expired_entries() {
        let table = RpcTable::new();
        table.register(&rpc_id(1), Waiter::EvictionChallenge).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reaped = table.gc(Duration::from_millis(10)).await;
        assert_eq!(reaped, 1);
        assert_eq!(table.len().await, 0);
    }

    #[tokio::test]
    async fn test_eviction_challenge_resolution() {
        let table = RpcTable::new();
        table.register(&rpc_id(3), Waiter::EvictionChallenge).await;
        assert!(table.resolve_eviction_challenge(&rpc_id(3)).await);
        assert!(!table.resolve_eviction_challenge(&rpc_id(3)).await);
    }
}
