//! A pooled, TLS-protected connection keyed by the peer's *advertised*
//! listening port rather than its ephemeral source port (§4.3 handshake).

use std::pin::Pin;
use std::time::Instant;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ConnKey {
    V4([u8; 4], u16),
    V6([u8; 16], u16),
}

/// One reused connection: split reader/writer, a write-side lock so
/// concurrent senders don't interleave frames, and a last-use timestamp
/// for the idle-cleanup sweep.
pub struct Connection {
    pub key: ConnKey,
    writer: Mutex<Pin<Box<dyn AsyncWrite + Unpin + Send>>>,
    last_use: Mutex<Instant>,
}

impl Connection {
    pub fn new(key: ConnKey, writer: Pin<Box<dyn AsyncWrite + Unpin + Send>>) -> Self {
        Self { key, writer: Mutex::new(writer), last_use: Mutex::new(Instant::now()) }
    }

    pub async fn write_frame(&self, body: &[u8]) -> std::io::Result<()> {
        let mut w = self.writer.lock().await;
        crate::wire::write_frame(&mut *w, body).await?;
        *self.last_use.lock().await = Instant::now();
        Ok(())
    }

    pub async fn touch(&self) {
        *self.last_use.lock().await = Instant::now();
    }

    pub async fn idle_for(&self) -> std::time::Duration {
        self.last_use.lock().await.elapsed()
    }
}
