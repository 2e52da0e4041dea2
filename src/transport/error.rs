use thiserror::Error;

/// Errors surfaced by the connection-reuse transport (§7).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("read/write timed out")]
    IoTimeout,

    #[error("connection to {0} refused")]
    ConnectionRefused(String),

    #[error("host unreachable on both address families")]
    HostUnreachable,

    #[error(transparent)]
    Wire(#[from] crate::error::WireError),

    #[error("correlated reply did not arrive before the transport timeout")]
    Timeout,
}
