//! One-time bootstrap sequence against a seed peer (§4.7).

use std::net::ToSocketAddrs;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::domain::entities::{NodeId, PeerAddr, PeerRecord};
use crate::transport::{Envelope, Status, TransportError};
use crate::wire::Message;

use super::rpc_table::Waiter;
use super::Node;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not resolve bootstrap host {0}")]
    UnresolvableHost(String),

    #[error("bootstrap peer did not answer after retry")]
    NoPong,

    #[error("FIND_NODE through bootstrap peer yielded no neighbours after retry")]
    NoNeighbours,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Runs the 5-step sequence of §4.7: resolve, PING with one retry,
/// identify self from `ALL_ADDR`/`CLI_ADDR`, corroborate with a second
/// PING, then `FIND_NODE(random_id)` with one retry.
pub(super) async fn run(node: &Arc<Node>, host: &str, port: u16) -> Result<(), BootstrapError> {
    let ip = resolve_host(host, port)?;
    let addr = match ip {
        std::net::IpAddr::V4(v4) => PeerAddr::v4_only(v4.octets()),
        std::net::IpAddr::V6(v6) => PeerAddr::v6_only(v6.octets()),
    };
    // Placeholder id (§4.7 step 1): a real id arrives with the first PONG's
    // `ALL_ADDR`, so any id works as the provisional record's key here.
    let provisional = PeerRecord::new(NodeId::zero(), port, addr);

    let first_pong = ping_with_retry(node, &provisional).await?;
    let (all_addr, cli_addr) = match first_pong {
        Message::Pong { all_addr, cli_addr, .. } => (all_addr, cli_addr),
        _ => return Err(BootstrapError::NoPong),
    };

    adopt_public_address(node, &cli_addr).await;

    // Step 4: corroborating second PING to the now fully-identified peer.
    // Registered as an eviction-challenge waiter so the matching PONG reaches
    // `handle_pong`'s solicited path and the peer actually lands in the
    // routing table instead of vanishing once `send_message` returns.
    let rpc_id = rand_identity();
    node.rpc_table.register(&rpc_id, Waiter::EvictionChallenge).await;
    let corroborating_ping = Message::Ping { peer_id: node.local_id, rpc_id: Some(rpc_id) };
    let _ = node.transport.send_message(&all_addr, &corroborating_ping).await;
    tokio::time::sleep(node.config.sleep_wait).await;

    *node.bootstrap_peer.lock().await = Some(all_addr.clone());

    let mut tries = 0;
    loop {
        let target = NodeId::random();
        node.lookup.find_node(target, Some(all_addr.clone())).await;
        if node.table.lock().await.total_peers() > 0 {
            return Ok(());
        }
        tries += 1;
        if tries > 1 {
            return Err(BootstrapError::NoNeighbours);
        }
        tokio::time::sleep(node.config.sleep_wait * 3).await;
    }
}

fn resolve_host(host: &str, port: u16) -> Result<std::net::IpAddr, BootstrapError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|_| BootstrapError::UnresolvableHost(host.to_string()))?
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| BootstrapError::UnresolvableHost(host.to_string()))
}

fn ping_message(node: &Node) -> Message {
    Message::Ping { peer_id: node.local_id, rpc_id: None }
}

/// Sends a correlated PING via `Transport::communicate`, retrying once
/// after `3*SLEEP_WAIT` per §4.7 step 2.
async fn ping_with_retry(node: &Arc<Node>, peer: &PeerRecord) -> Result<Message, BootstrapError> {
    match try_ping(node, peer).await {
        Ok(msg) => Ok(msg),
        Err(_) => {
            tokio::time::sleep(node.config.sleep_wait * 3).await;
            try_ping(node, peer).await.map_err(|_| BootstrapError::NoPong)
        }
    }
}

async fn try_ping(node: &Arc<Node>, peer: &PeerRecord) -> Result<Message, TransportError> {
    let conn = node.transport.get_connection(peer.port, peer.addr.v6, peer.addr.v4).await?;
    let identity = rand_identity();
    let envelope = Envelope {
        identity,
        data: ping_message(node).encode(),
        status: Status::Success,
        port: peer.port,
        address_v4: peer.addr.v4,
        address_v6: peer.addr.v6,
    };
    let reply = node.transport.communicate(&conn, envelope).await?;
    Message::decode(&reply.data).map_err(TransportError::from)
}

async fn adopt_public_address(node: &Arc<Node>, observed: &PeerRecord) {
    let mut public_addr = node.public_addr.lock().await;
    if public_addr.is_empty() {
        *public_addr = observed.addr;
        return;
    }
    if public_addr.v4.is_some() && observed.addr.v4.is_some() && public_addr.v4 != observed.addr.v4 {
        warn!(configured = ?public_addr.v4, observed = ?observed.addr.v4, "public v4 address disagrees with bootstrap peer's CLI_ADDR, keeping configured value");
    }
    if public_addr.v6.is_some() && observed.addr.v6.is_some() && public_addr.v6 != observed.addr.v6 {
        warn!(configured = ?public_addr.v6, observed = ?observed.addr.v6, "public v6 address disagrees with bootstrap peer's CLI_ADDR, keeping configured value");
    }
}

fn rand_identity() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    bytes
}
