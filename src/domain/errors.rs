//! Domain-layer errors: hand-written `Display`, no external crate.
//!
//! Infrastructure-layer errors (wire decoding, transport, lookup, node)
//! use `thiserror` instead — see `crate::error`.

use std::fmt;

/// Errors produced by pure routing-table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingTableError {
    /// `insert` was called with a peer whose id equals the local node's.
    SelfInsert,
}

impl fmt::Display for RoutingTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfInsert => write!(f, "cannot insert the local node into its own routing table"),
        }
    }
}

impl std::error::Error for RoutingTableError {}
