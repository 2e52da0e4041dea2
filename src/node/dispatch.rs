//! Inbound-message dispatch table (§4.7).
//!
//! `wire::Message::decode` already enforces §4.7's per-field typed checks
//! (length, known tag, known vocabulary) by construction — a tagged sum has
//! no room for an unknown key — so this module only needs to react to each
//! known variant and apply the routing-table side effects of §4.4.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::entities::{PeerAddr, PeerRecord};
use crate::domain::routing_table::InsertOutcome;
use crate::node::rpc_table::Waiter;
use crate::transport::Inbound;
use crate::wire::Message;

use super::Node;

/// Handles one inbound envelope that did not correlate to an outstanding
/// `communicate()` call — it flows through the normal dispatch table.
pub(crate) async fn handle(node: &Arc<Node>, inbound: Inbound) {
    let addr = match inbound.conn_key {
        crate::transport::ConnKey::V4(v4, _) => PeerAddr::v4_only(v4),
        crate::transport::ConnKey::V6(v6, _) => PeerAddr::v6_only(v6),
    };
    let port = inbound.envelope.port;
    let identity = inbound.envelope.identity;

    let message = match Message::decode(&inbound.envelope.data) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "dropping unverifiable message");
            return;
        }
    };

    match message {
        Message::Ping { peer_id, rpc_id } => handle_ping(node, peer_id, rpc_id, addr, port, identity).await,
        Message::Pong { peer_id, rpc_id, .. } => handle_pong(node, peer_id, rpc_id, addr, port).await,
        Message::FindNode { peer_id, rpc_id, target } => handle_find(node, peer_id, rpc_id, target, addr, port, false, identity).await,
        Message::FindValue { peer_id, rpc_id, target } => handle_find(node, peer_id, rpc_id, target, addr, port, true, identity).await,
        Message::Store { key, value, .. } => {
            node.store.lock().await.set(key, value);
        }
        Message::FoundNodes { peer_id, rpc_id, nodes } => {
            if node.rpc_table.resolve_found_nodes(&rpc_id, nodes).await {
                observe_peer(node, PeerRecord::new(peer_id, port, addr), true).await;
            }
        }
        Message::FoundValue { peer_id, rpc_id, value } => {
            if node.rpc_table.resolve_found_value(&rpc_id, value).await {
                observe_peer(node, PeerRecord::new(peer_id, port, addr), true).await;
            }
        }
        Message::FwPing { .. } | Message::FwPong { .. } => {
            // Answered on the dedicated probe socket (`node::firewall`), not
            // the reliable transport; a copy arriving here is ignored.
        }
    }
}

async fn handle_ping(
    node: &Arc<Node>,
    sender_id: crate::domain::NodeId,
    rpc_id: Option<crate::wire::RpcId>,
    addr: PeerAddr,
    port: u16,
    identity: [u8; 32],
) {
    let sender = PeerRecord::new(sender_id, port, addr);
    let reply = Message::Pong {
        peer_id: node.local_id,
        rpc_id,
        all_addr: node.self_peer_record().await,
        cli_addr: sender.clone(),
    };
    // Mirrors the request's envelope identity so a synchronous
    // `communicate()` caller (bootstrap's initial ping) sees its reply.
    if let Err(e) = node.transport.reply_message(&sender, identity, &reply).await {
        debug!(peer = ?sender_id, error = %e, "failed to reply to ping");
    }
    observe_peer(node, sender, false).await;
}

async fn handle_pong(
    node: &Arc<Node>,
    sender_id: crate::domain::NodeId,
    rpc_id: Option<crate::wire::RpcId>,
    addr: PeerAddr,
    port: u16,
) {
    // Prevent a DoS that flushes buckets with unsolicited PONGs: only a
    // PONG whose `RPC_ID` matches an outstanding eviction challenge we
    // issued counts as liveness proof.
    let matched = match rpc_id {
        Some(rpc_id) => node.rpc_table.resolve_eviction_challenge(&rpc_id).await,
        None => false,
    };
    if !matched {
        return;
    }
    let mut sender = PeerRecord::new(sender_id, port, addr);
    sender.well_connected = true;
    observe_peer(node, sender, true).await;
}

async fn handle_find(
    node: &Arc<Node>,
    sender_id: crate::domain::NodeId,
    rpc_id: crate::wire::RpcId,
    target: crate::domain::NodeId,
    addr: PeerAddr,
    port: u16,
    find_value: bool,
    identity: [u8; 32],
) {
    let sender = PeerRecord::new(sender_id, port, addr);

    if find_value {
        if let Some(value) = node.store.lock().await.get(&target).cloned() {
            let reply = Message::FoundValue { peer_id: node.local_id, rpc_id, value };
            if let Err(e) = node.transport.reply_message(&sender, identity, &reply).await {
                debug!(peer = ?sender_id, error = %e, "failed to reply to find_value");
            }
            observe_peer(node, sender, false).await;
            return;
        }
    }

    let mut nearest = node.table.lock().await.nearest(&target, node.config.k);
    if nearest.is_empty() {
        nearest.push(node.self_peer_record().await);
    }
    let reply = Message::FoundNodes { peer_id: node.local_id, rpc_id, nodes: nearest };
    if let Err(e) = node.transport.reply_message(&sender, identity, &reply).await {
        debug!(peer = ?sender_id, error = %e, "failed to reply to find_node");
    }
    observe_peer(node, sender, false).await;
}

/// Applies §4.4's insertion policy and the network side-effects its
/// outcome obliges: a popped bucket head gets an asynchronous liveness
/// challenge; an evicted, already-proven tail needs nothing further.
pub(crate) async fn observe_peer(node: &Arc<Node>, peer: PeerRecord, solicited: bool) {
    let outcome = {
        let mut table = node.table.lock().await;
        table.insert(peer, solicited)
    };
    match outcome {
        Ok(InsertOutcome::ChallengeHead { challenge }) => {
            challenge_head(node, challenge).await;
        }
        Ok(InsertOutcome::EvictedSolicited { evicted }) => {
            debug!(peer = ?evicted.id, "evicted stale bucket tail for a proven peer");
        }
        Ok(_) => {}
        Err(e) => {
            debug!(error = %e, "routing table rejected observed peer");
        }
    }
}

async fn challenge_head(node: &Arc<Node>, peer: PeerRecord) {
    let mut rpc_id = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut rpc_id);
    node.rpc_table.register(&rpc_id, Waiter::EvictionChallenge).await;
    let ping = Message::Ping { peer_id: node.local_id, rpc_id: Some(rpc_id) };
    if let Err(e) = node.transport.send_message(&peer, &ping).await {
        debug!(peer = ?peer.id, error = %e, "eviction challenge ping failed to send");
    }
}

