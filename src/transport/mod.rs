//! Reliable small-message transport (C3): connection-reusing, length-framed,
//! TLS-protected message pipe with request/response correlation.

pub mod connection;
pub mod envelope;
pub mod error;
pub mod tls;


pub use connection::{ConnKey, Connection};
pub use envelope::{Envelope, Status};
pub use error::TransportError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::{debug, warn};

use crate::config::NodeConfig;

/// An envelope received from a peer that did not correlate to a pending
/// `communicate()` call — handed to the node layer's dispatcher.
pub struct Inbound {
    pub envelope: Envelope,
    pub conn_key: ConnKey,
}

pub struct Transport {
    listen_port: u16,
    identity: tls::NodeIdentity,
    connector: TlsConnector,
    acceptor: TlsAcceptor,
    pool: Mutex<HashMap<ConnKey, Arc<Connection>>>,
    pending: Mutex<HashMap<[u8; 32], oneshot::Sender<Envelope>>>,
    inbound_tx: mpsc::Sender<Inbound>,
    max_msg_size: usize,
    io_timeout: Duration,
    reuse_time: Duration,
}

impl Transport {
    /// Builds a transport and its listener, returning the transport plus the
    /// receiver end the node layer reads unsolicited envelopes from.
    pub async fn bind(config: &NodeConfig) -> Result<(Arc<Self>, mpsc::Receiver<Inbound>, TcpListener), TransportError> {
        let identity = tls::NodeIdentity::generate()?;
        let server_cfg = tls::server_config(&identity)?;
        let client_cfg = tls::client_config(&identity)?;

        let listener = TcpListener::bind((config.bind_host, config.port)).await?;
        let (inbound_tx, inbound_rx) = mpsc::channel(256);

        let transport = Arc::new(Self {
            listen_port: config.port,
            identity,
            connector: TlsConnector::from(client_cfg),
            acceptor: TlsAcceptor::from(server_cfg),
            pool: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            inbound_tx,
            max_msg_size: config.max_msg_size,
            io_timeout: config.io_timeout,
            reuse_time: config.reuse_time,
        });

        Ok((transport, inbound_rx, listener))
    }

    /// Accepts one inbound TCP connection, completes the TLS and listening-port
    /// handshake, and spawns its read loop. Call this in a loop against the
    /// listener returned by `bind`.
    pub async fn accept(self: &Arc<Self>, stream: TcpStream) -> Result<(), TransportError> {
        let peer_ip = stream.peer_addr()?.ip();
        let tls_stream = self.acceptor.accept(stream).await.map_err(|e| TransportError::Tls(e.to_string()))?;
        let (mut read_half, mut write_half) = tokio::io::split(tls_stream);

        write_half.write_u16(self.listen_port).await?;
        let remote_port = tokio::time::timeout(self.io_timeout, read_half.read_u16())
            .await
            .map_err(|_| TransportError::IoTimeout)??;

        let key = conn_key_for(peer_ip, remote_port);

        let conn = Arc::new(Connection::new(key, Box::pin(write_half)));
        self.pool.lock().await.insert(key, conn.clone());
        self.spawn_read_loop(key, read_half);
        Ok(())
    }

    /// Gets a pooled connection for `port`, dialing v6 then v4 if none exists.
    pub async fn get_connection(
        self: &Arc<Self>,
        port: u16,
        address_v6: Option<[u8; 16]>,
        address_v4: Option<[u8; 4]>,
    ) -> Result<Arc<Connection>, TransportError> {
        if let Some(v6) = address_v6 {
            if let Some(conn) = self.pool.lock().await.get(&ConnKey::V6(v6, port)) {
                return Ok(conn.clone());
            }
        }
        if let Some(v4) = address_v4 {
            if let Some(conn) = self.pool.lock().await.get(&ConnKey::V4(v4, port)) {
                return Ok(conn.clone());
            }
        }

        let mut last_err = None;
        if let Some(v6) = address_v6 {
            match self.dial(std::net::IpAddr::V6(v6.into()), port).await {
                Ok(conn) => return Ok(conn),
                Err(e) => last_err = Some(e),
            }
        }
        if let Some(v4) = address_v4 {
            match self.dial(std::net::IpAddr::V4(v4.into()), port).await {
                Ok(conn) => return Ok(conn),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(TransportError::HostUnreachable))
    }

    async fn dial(self: &Arc<Self>, ip: std::net::IpAddr, port: u16) -> Result<Arc<Connection>, TransportError> {
        let stream = tokio::time::timeout(self.io_timeout, TcpStream::connect((ip, port)))
            .await
            .map_err(|_| TransportError::ConnectTimeout(ip.to_string()))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused(ip.to_string()),
                _ => TransportError::Io(e),
            })?;

        let server_name = rustls::pki_types::ServerName::try_from("localhost")
            .map_err(|_| TransportError::Tls("invalid server name".into()))?
            .to_owned();
        let tls_stream = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        let (mut read_half, mut write_half) = tokio::io::split(tls_stream);

        write_half.write_u16(self.listen_port).await?;
        let remote_port = tokio::time::timeout(self.io_timeout, read_half.read_u16())
            .await
            .map_err(|_| TransportError::IoTimeout)??;

        let key = conn_key_for(ip, remote_port);
        let conn = Arc::new(Connection::new(key, Box::pin(write_half)));
        self.pool.lock().await.insert(key, conn.clone());
        self.spawn_read_loop(key, read_half);
        Ok(conn)
    }

    fn spawn_read_loop<R>(self: &Arc<Self>, key: ConnKey, mut reader: R)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let transport = self.clone();
        tokio::spawn(async move {
            loop {
                let body = match crate::wire::read_frame(&mut reader, transport.max_msg_size).await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(?key, error = %e, "closing connection after frame error");
                        transport.reply_bad_message(key).await;
                        break;
                    }
                };
                let mut envelope = match Envelope::decode(&body) {
                    Ok(env) => env,
                    Err(e) => {
                        warn!(?key, error = %e, "closing connection after malformed envelope");
                        transport.reply_bad_message(key).await;
                        break;
                    }
                };
                // Overwrite the addressing fields with the connection's actual
                // peer, matching `lazymq`'s `_handle_connection` behaviour: a
                // sender's self-reported address is never trusted over the
                // observed socket.
                match key {
                    ConnKey::V4(v4, port) => {
                        envelope.address_v4 = Some(v4);
                        envelope.address_v6 = None;
                        envelope.port = port;
                    }
                    ConnKey::V6(v6, port) => {
                        envelope.address_v6 = Some(v6);
                        envelope.address_v4 = None;
                        envelope.port = port;
                    }
                }
                if let Some(conn) = transport.pool.lock().await.get(&key) {
                    conn.touch().await;
                }

                let mut pending = transport.pending.lock().await;
                if let Some(waiter) = pending.remove(&envelope.identity) {
                    drop(pending);
                    let _ = waiter.send(envelope);
                } else {
                    drop(pending);
                    let _ = transport.inbound_tx.send(Inbound { envelope, conn_key: key }).await;
                }
            }
            transport.pool.lock().await.remove(&key);
            debug!(?key, "connection closed");
        });
    }

    /// Sends `envelope` and awaits the next envelope whose `identity`
    /// matches, bounded by `TIMEOUT` (§4.3 `communicate`).
    pub async fn communicate(self: &Arc<Self>, conn: &Connection, envelope: Envelope) -> Result<Envelope, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(envelope.identity, tx);
        if let Err(e) = conn.write_frame(&envelope.encode()).await {
            self.pending.lock().await.remove(&envelope.identity);
            return Err(e.into());
        }
        match tokio::time::timeout(self.io_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            _ => {
                self.pending.lock().await.remove(&envelope.identity);
                Err(TransportError::Timeout)
            }
        }
    }

    /// Sends `envelope` without waiting for a correlated reply.
    pub async fn send(&self, conn: &Connection, envelope: &Envelope) -> Result<(), TransportError> {
        conn.write_frame(&envelope.encode()).await.map_err(Into::into)
    }

    /// Dials (or reuses a pooled connection to) `peer` and fires a DHT
    /// message at it, fire-and-forget. Callers that need the reply
    /// correlate it themselves, either through `RpcTable` (lookup, eviction
    /// challenges) or by calling `communicate` directly instead.
    pub async fn send_message(self: &Arc<Self>, peer: &crate::domain::PeerRecord, message: &crate::wire::Message) -> Result<(), TransportError> {
        let conn = self.get_connection(peer.port, peer.addr.v6, peer.addr.v4).await?;
        let envelope = Envelope {
            identity: random_identity(),
            data: message.encode(),
            status: Status::Success,
            port: peer.port,
            address_v4: peer.addr.v4,
            address_v6: peer.addr.v6,
        };
        self.send(&conn, &envelope).await
    }

    /// Like `send_message`, but mirrors `identity` instead of minting a
    /// fresh one — lets a dispatch handler answer a request in a way that
    /// resolves the sender's `communicate()` wait, without both sides
    /// having to share an `RpcTable` entry for it.
    pub async fn reply_message(
        self: &Arc<Self>,
        peer: &crate::domain::PeerRecord,
        identity: [u8; 32],
        message: &crate::wire::Message,
    ) -> Result<(), TransportError> {
        let conn = self.get_connection(peer.port, peer.addr.v6, peer.addr.v4).await?;
        let envelope = Envelope {
            identity,
            data: message.encode(),
            status: Status::Success,
            port: peer.port,
            address_v4: peer.addr.v4,
            address_v6: peer.addr.v6,
        };
        self.send(&conn, &envelope).await
    }

    /// Looks up the connection for `key` and schedules a `BAD_MESSAGE` reply
    /// on it, if the connection is still pooled. The original message's
    /// `identity` could not be parsed, so a fresh one is used — the sender's
    /// own read loop only needs the status, not a correlated reply.
    async fn reply_bad_message(self: &Arc<Self>, key: ConnKey) {
        let port = match key {
            ConnKey::V4(_, port) | ConnKey::V6(_, port) => port,
        };
        if let Some(conn) = self.pool.lock().await.get(&key).cloned() {
            self.schedule_bad_message_reply(conn, random_identity(), port);
        }
    }

    /// Schedules a `BAD_MESSAGE` reply after a random 0.5-1.0s back-off, per
    /// §4.3's error-reporting policy. Never blocks the caller.
    pub fn schedule_bad_message_reply(self: &Arc<Self>, conn: Arc<Connection>, identity: [u8; 32], port: u16) {
        let transport = self.clone();
        tokio::spawn(async move {
            let wait_ms = rand::thread_rng().gen_range(500..=1000);
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            let reply = Envelope { identity, data: Vec::new(), status: Status::BadMessage, port, address_v4: None, address_v6: None };
            let _ = transport.send(&conn, &reply).await;
        });
    }

    /// Background sweep closing connections idle past `REUSE_TIME` (§4.3 cleanup).
    pub async fn run_cleanup_loop(self: Arc<Self>, stop: tokio::sync::watch::Receiver<bool>) {
        let mut stop = stop;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.reuse_time) => {}
                _ = stop.changed() => {
                    if *stop.borrow() { return; }
                }
            }
            let mut pool = self.pool.lock().await;
            let mut stale = Vec::new();
            for (key, conn) in pool.iter() {
                if conn.idle_for().await >= self.reuse_time {
                    stale.push(*key);
                }
            }
            for key in stale {
                pool.remove(&key);
            }
        }
    }
}

fn conn_key_for(ip: std::net::IpAddr, port: u16) -> ConnKey {
    match ip {
        std::net::IpAddr::V4(v4) => ConnKey::V4(v4.octets(), port),
        std::net::IpAddr::V6(v6) => ConnKey::V6(v6.octets(), port),
    }
}

fn random_identity() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    bytes
}
