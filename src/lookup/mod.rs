//! Iterative `FIND_NODE` / `FIND_VALUE` lookup engine (C6).


use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::NodeConfig;
use crate::domain::entities::NodeId;
use crate::domain::{PeerRecord, RoutingTable, Shortlist};
use crate::node::rpc_table::{RpcTable, Waiter};
use crate::transport::Transport;
use crate::wire::Message;

pub struct LookupEngine {
    local_id: NodeId,
    k: usize,
    alpha: usize,
    sleep_wait: std::time::Duration,
    table: Arc<Mutex<RoutingTable>>,
    rpc_table: Arc<RpcTable>,
    transport: Arc<Transport>,
}

impl LookupEngine {
    pub fn new(local_id: NodeId, config: &NodeConfig, table: Arc<Mutex<RoutingTable>>, rpc_table: Arc<RpcTable>, transport: Arc<Transport>) -> Self {
        Self { local_id, k: config.k, alpha: config.alpha, sleep_wait: config.sleep_wait, table, rpc_table, transport }
    }

    /// Drives a `FIND_NODE(target)` to convergence, optionally seeding the
    /// first round through an explicit bootstrap peer (§4.6).
    pub async fn find_node(&self, target: NodeId, bootstrap: Option<PeerRecord>) -> Vec<PeerRecord> {
        let shortlist = Arc::new(self.seed(target).await);

        if let Some(peer) = bootstrap {
            self.dispatch(&peer, &shortlist, false).await;
        }

        while !shortlist.complete() {
            let batch = shortlist.next_iteration(self.alpha);
            for peer in &batch {
                self.dispatch(peer, &shortlist, false).await;
            }
            shortlist.completion_result(self.sleep_wait).await;
        }

        shortlist.results()
    }

    /// Same iteration structure, but a `FOUND_VALUE` short-circuits with the
    /// value immediately (§4.6).
    pub async fn find_value(&self, target: NodeId, bootstrap: Option<PeerRecord>) -> Option<Vec<u8>> {
        let shortlist = Arc::new(self.seed(target).await);

        if let Some(peer) = bootstrap {
            self.dispatch(&peer, &shortlist, true).await;
        }

        loop {
            if let Some(value) = shortlist.resolved_value() {
                return value;
            }
            if shortlist.complete() {
                return None;
            }
            let batch = shortlist.next_iteration(self.alpha);
            for peer in &batch {
                self.dispatch(peer, &shortlist, true).await;
            }
            shortlist.completion_result(self.sleep_wait).await;
        }
    }

    async fn seed(&self, target: NodeId) -> Shortlist {
        let shortlist = Shortlist::new(self.k, target, self.local_id);
        let nearest = self.table.lock().await.nearest(&target, self.k);
        shortlist.update(nearest);
        shortlist
    }

    async fn dispatch(&self, peer: &PeerRecord, shortlist: &Arc<Shortlist>, find_value: bool) {
        let mut rpc_id = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut rpc_id);
        self.rpc_table.register(&rpc_id, Waiter::Lookup(shortlist.clone())).await;

        let message = if find_value {
            Message::FindValue { peer_id: self.local_id, rpc_id, target: *shortlist.target() }
        } else {
            Message::FindNode { peer_id: self.local_id, rpc_id, target: *shortlist.target() }
        };

        if let Err(e) = self.transport.send_message(peer, &message).await {
            debug!(peer = ?peer.id, error = %e, "lookup request failed to send");
        }
    }
}
