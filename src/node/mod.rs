//! The DHT node (C7): public `put`/`get`, bootstrap, inbound dispatch, and
//! the glue wiring the lower layers (transport, routing table, lookup
//! engine) into one running peer.

pub mod bootstrap;
mod dispatch;
mod firewall;
pub mod rpc_table;
pub mod value_store;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::domain::entities::{NodeId, PeerAddr, PeerRecord};
use crate::domain::RoutingTable;
use crate::error::DhtError;
use crate::lookup::LookupEngine;
use crate::transport::Transport;
use crate::wire::Message;

use bootstrap::BootstrapError;
use firewall::FirewallProbe;
use rpc_table::RpcTable;
use value_store::ValueStore;

pub struct Node {
    pub(crate) local_id: NodeId,
    pub(crate) config: NodeConfig,
    table: Arc<Mutex<RoutingTable>>,
    store: Mutex<ValueStore>,
    rpc_table: Arc<RpcTable>,
    transport: Arc<Transport>,
    lookup: LookupEngine,
    firewalled: AtomicBool,
    bootstrap_peer: Mutex<Option<PeerRecord>>,
    public_addr: Mutex<PeerAddr>,
    firewall_probe: Mutex<Option<Arc<FirewallProbe>>>,
    stop_tx: watch::Sender<bool>,
}

impl Node {
    /// Binds the reliable transport and the firewall-probe socket, then
    /// spawns the accept loop, the inbound dispatcher, and the three
    /// maintenance tasks of §4.8. Does not bootstrap; call `bootstrap`
    /// afterwards if a seed is configured.
    pub async fn bind(config: NodeConfig) -> Result<Arc<Self>, DhtError> {
        let local_id = NodeId::random();
        let (transport, inbound_rx, listener) = Transport::bind(&config).await?;
        let table = Arc::new(Mutex::new(RoutingTable::new(local_id, config.k)));
        let rpc_table = Arc::new(RpcTable::new());
        let lookup = LookupEngine::new(local_id, &config, table.clone(), rpc_table.clone(), transport.clone());
        let public_addr = PeerAddr { v4: config.public_v4_override, v6: config.public_v6_override };
        let (stop_tx, stop_rx) = watch::channel(false);

        let node = Arc::new(Self {
            local_id,
            config: config.clone(),
            table,
            store: Mutex::new(ValueStore::new()),
            rpc_table,
            transport: transport.clone(),
            lookup,
            firewalled: AtomicBool::new(true),
            bootstrap_peer: Mutex::new(None),
            public_addr: Mutex::new(public_addr),
            firewall_probe: Mutex::new(None),
            stop_tx,
        });

        spawn_accept_loop(transport.clone(), listener);
        spawn_dispatch_loop(node.clone(), inbound_rx);

        match FirewallProbe::bind(config.bind_host, config.port.wrapping_add(1)).await {
            Ok(probe) => {
                let probe = Arc::new(probe);
                probe.clone().spawn_recv_loop(node.clone());
                *node.firewall_probe.lock().await = Some(probe);
            }
            Err(e) => warn!(error = %e, "firewall probe socket unavailable, skipping firewall checks"),
        }

        crate::maintenance::spawn_all(node.clone(), stop_rx, transport);

        Ok(node)
    }

    /// Runs the §4.7 bootstrap sequence against a seed peer.
    pub async fn bootstrap(self: &Arc<Self>, host: &str, port: u16) -> Result<(), BootstrapError> {
        bootstrap::run(self, host, port).await
    }

    /// `hk = H(encode(key)); FIND_NODE(hk); STORE(hk, value)` on every
    /// returned peer, plus a local copy. Returns once all STOREs have been
    /// dispatched, not acknowledged (§4.7).
    pub async fn put(self: &Arc<Self>, key: &[u8], value: Vec<u8>) {
        let hashed_key = NodeId::hash_of(key);
        let nearest = self.lookup.find_node(hashed_key, None).await;
        self.store.lock().await.set(hashed_key, value.clone());
        for peer in nearest {
            let message = Message::Store { peer_id: self.local_id, key: hashed_key, value: value.clone() };
            if let Err(e) = self.transport.send_message(&peer, &message).await {
                debug!(peer = ?peer.id, error = %e, "store dispatch failed");
            }
        }
    }

    /// `hk = H(encode(key))`; local lookup first, else `FIND_VALUE(hk)`.
    pub async fn get(self: &Arc<Self>, key: &[u8]) -> Option<Vec<u8>> {
        let hashed_key = NodeId::hash_of(key);
        if let Some(value) = self.store.lock().await.get(&hashed_key).cloned() {
            return Some(value);
        }
        self.lookup.find_value(hashed_key, None).await
    }

    /// Signals every maintenance task to stop at its next check.
    pub fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub(crate) async fn self_peer_record(&self) -> PeerRecord {
        let addr = *self.public_addr.lock().await;
        PeerRecord::new(self.local_id, self.config.port, addr)
    }

    pub(crate) fn is_firewalled(&self) -> bool {
        self.firewalled.load(Ordering::SeqCst)
    }

    pub(crate) async fn bootstrap_peer(&self) -> Option<PeerRecord> {
        self.bootstrap_peer.lock().await.clone()
    }

    pub(crate) fn lookup(&self) -> &LookupEngine {
        &self.lookup
    }

    pub(crate) fn rpc_table(&self) -> &Arc<RpcTable> {
        &self.rpc_table
    }

    /// Sends an `FW_PING` to `peer`'s probe socket (`peer.port + 1`), if the
    /// local probe socket bound successfully (§4.8 firewall check task).
    pub(crate) async fn send_fw_ping(&self, peer: &PeerRecord) {
        let Some(probe) = self.firewall_probe.lock().await.clone() else { return };
        let Some(to) = probe_addr(peer) else { return };
        if let Err(e) = probe.send_fw_ping(self.local_id, to).await {
            debug!(peer = ?peer.id, error = %e, "firewall ping failed to send");
        }
    }
}

fn probe_addr(peer: &PeerRecord) -> Option<std::net::SocketAddr> {
    let probe_port = peer.port.wrapping_add(1);
    if let Some(v4) = peer.addr.v4 {
        return Some(std::net::SocketAddr::from((std::net::Ipv4Addr::from(v4), probe_port)));
    }
    if let Some(v6) = peer.addr.v6 {
        return Some(std::net::SocketAddr::from((std::net::Ipv6Addr::from(v6), probe_port)));
    }
    None
}

fn spawn_accept_loop(transport: Arc<Transport>, listener: TcpListener) {
    tokio::spawn(async move {
        loop {
            let (stream, _peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let transport = transport.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.accept(stream).await {
                    debug!(error = %e, "inbound handshake failed");
                }
            });
        }
    });
}

/// Fans inbound envelopes out to `dispatch::handle`, bounded to `WORKERS`
/// concurrent handlers (§4.3's "small thread pool for request handlers").
fn spawn_dispatch_loop(node: Arc<Node>, mut inbound_rx: tokio::sync::mpsc::Receiver<crate::transport::Inbound>) {
    let workers = Arc::new(tokio::sync::Semaphore::new(crate::config::WORKERS));
    tokio::spawn(async move {
        while let Some(inbound) = inbound_rx.recv().await {
            let node = node.clone();
            let permit = workers.clone().acquire_owned().await.expect("semaphore never closed");
            tokio::spawn(async move {
                dispatch::handle(&node, inbound).await;
                drop(permit);
            });
        }
    });
}
