//! Infrastructure-layer errors: `thiserror`-derived, one tier up from
//! `domain::errors`'s hand-written `Display` impls.

use thiserror::Error;

/// Errors surfaced to the node's own API (`put`/`get`/bootstrap).
#[derive(Debug, Error)]
pub enum DhtError {
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] crate::node::bootstrap::BootstrapError),

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    #[error("value not found")]
    NotFound,
}

/// Wire decode/validation failures (§7 `BadMessage` / `MaxSize`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("frame exceeds MAX_MSG_SIZE ({0} bytes)")]
    MaxSize(usize),

    #[error("malformed message: {0}")]
    BadMessage(&'static str),
}
