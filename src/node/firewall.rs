//! Firewall-probe protocol (§4.7, §6): a single-datagram `FW_PING`/`FW_PONG`
//! exchange on the auxiliary `PORT + 1` socket, independent of the reliable
//! TLS transport. Receiving a `FW_PONG` carrying our own node-id proves that
//! unsolicited traffic reaches us, i.e. we are not firewalled.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::domain::entities::NodeId;
use crate::wire::Message;

use super::Node;

const MAX_DATAGRAM: usize = 128;

pub(crate) struct FirewallProbe {
    socket: UdpSocket,
}

impl FirewallProbe {
    pub(crate) async fn bind(bind_host: std::net::IpAddr, port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((bind_host, port)).await?;
        Ok(Self { socket })
    }

    pub(crate) async fn send_fw_ping(&self, peer_id: NodeId, to: SocketAddr) -> std::io::Result<()> {
        let bytes = Message::FwPing { peer_id }.encode();
        self.socket.send_to(&bytes, to).await.map(|_| ())
    }

    async fn send_fw_pong(&self, peer_id: NodeId, id: NodeId, to: SocketAddr) -> std::io::Result<()> {
        let bytes = Message::FwPong { peer_id, id }.encode();
        self.socket.send_to(&bytes, to).await.map(|_| ())
    }

    pub(crate) fn spawn_recv_loop(self: Arc<Self>, node: Arc<Node>) {
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];
            loop {
                let (len, from) = match self.socket.recv_from(&mut buf).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "firewall probe socket read failed");
                        continue;
                    }
                };
                match Message::decode(&buf[..len]) {
                    Ok(Message::FwPing { peer_id }) => {
                        debug!(from = %from, "fw ping received");
                        let _ = self.send_fw_pong(node.local_id, peer_id, from).await;
                    }
                    Ok(Message::FwPong { id, .. }) => {
                        if id == node.local_id {
                            node.firewalled.store(false, std::sync::atomic::Ordering::SeqCst);
                            info!("no longer marked as firewalled");
                        }
                    }
                    _ => {}
                }
            }
        });
    }
}
