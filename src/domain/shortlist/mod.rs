//! Per-lookup candidate set with a one-shot completion signal.

use std::sync::Mutex;

use tokio::sync::Notify;

use crate::domain::services::xor_distance;
use crate::domain::{NodeId, PeerRecord};

#[cfg(test)]
mod tests;

struct Entry {
    peer: PeerRecord,
    queried: bool,
}

struct Inner {
    entries: Vec<Entry>,
    completion: Option<Option<Vec<u8>>>,
}

/// Ordered candidate set for one in-progress `FIND_NODE`/`FIND_VALUE` call.
///
/// Entries are kept sorted ascending by XOR distance to `target`, truncated
/// to `k`. `notify` wakes any lookup-engine loop blocked in
/// `completion_result` whenever `update`/`set_complete` changes the state.
pub struct Shortlist {
    k: usize,
    target: NodeId,
    local_id: NodeId,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Shortlist {
    pub fn new(k: usize, target: NodeId, local_id: NodeId) -> Self {
        Self {
            k,
            target,
            local_id,
            inner: Mutex::new(Inner { entries: Vec::new(), completion: None }),
            notify: Notify::new(),
        }
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// Seeds or augments the shortlist with freshly observed peers. A peer
    /// is ignored if it is the target, the local node, already present, or
    /// the shortlist is already complete; otherwise it is inserted in
    /// distance order and the list is truncated to `k`.
    pub fn update(&self, peers: impl IntoIterator<Item = PeerRecord>) {
        let mut changed = false;
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.completion.is_some() {
                self.notify.notify_waiters();
                return;
            }
            for peer in peers {
                if peer.id == self.target || peer.id == self.local_id {
                    continue;
                }
                if inner.entries.iter().any(|e| e.peer.id == peer.id) {
                    continue;
                }
                let dist = xor_distance(&peer.id, &self.target);
                let pos = inner
                    .entries
                    .iter()
                    .position(|e| xor_distance(&e.peer.id, &self.target) > dist)
                    .unwrap_or(inner.entries.len());
                if pos < self.k {
                    inner.entries.insert(pos, Entry { peer, queried: false });
                    inner.entries.truncate(self.k);
                    changed = true;
                } else if inner.entries.len() < self.k {
                    inner.entries.push(Entry { peer, queried: false });
                    changed = true;
                }
            }
        }
        if changed {
            self.notify.notify_waiters();
        }
    }

    /// Flips a peer's `queried` flag once a request for it has been sent.
    pub fn mark_queried(&self, id: &NodeId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.entries.iter_mut().find(|e| &e.peer.id == id) {
            entry.queried = true;
        }
    }

    /// Up to `alpha` unqueried peers, closest first; marks them queried.
    pub fn next_iteration(&self, alpha: usize) -> Vec<PeerRecord> {
        let mut inner = self.inner.lock().unwrap();
        if inner.completion.is_some() {
            return Vec::new();
        }
        let mut batch = Vec::new();
        for entry in inner.entries.iter_mut() {
            if !entry.queried {
                entry.queried = true;
                batch.push(entry.peer.clone());
                if batch.len() >= alpha {
                    break;
                }
            }
        }
        batch
    }

    /// True once no unqueried peer remains, or once `set_complete` has run.
    pub fn complete(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.completion.is_some() || inner.entries.iter().all(|e| e.queried)
    }

    /// Resolves the completion signal, e.g. with a `FOUND_VALUE` payload or
    /// `None` once the caller has determined the lookup cannot find a value.
    pub fn set_complete(&self, value: Option<Vec<u8>>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.completion.is_none() {
            inner.completion = Some(value);
        }
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Waits up to `timeout` for a change, then returns the current
    /// completion value (`None` if not yet complete, translating a missed
    /// signal into "not found" for the caller's timeout loop).
    pub async fn completion_result(&self, timeout: std::time::Duration) -> Option<Vec<u8>> {
        if let Some(v) = self.peek_completion() {
            return v;
        }
        let notified = self.notify.notified();
        let _ = tokio::time::timeout(timeout, notified).await;
        self.peek_completion().flatten()
    }

    fn peek_completion(&self) -> Option<Option<Vec<u8>>> {
        self.inner.lock().unwrap().completion.clone()
    }

    /// Non-blocking read of the completion signal: `Some(value)` once
    /// `set_complete` has run (`value` is `None` for an explicit not-found),
    /// `None` if nothing has resolved it yet.
    pub fn resolved_value(&self) -> Option<Option<Vec<u8>>> {
        self.peek_completion()
    }

    /// The current candidate set, closest first.
    pub fn results(&self) -> Vec<PeerRecord> {
        self.inner.lock().unwrap().entries.iter().map(|e| e.peer.clone()).collect()
    }
}
