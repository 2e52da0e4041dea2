//! Core domain entities: node identity, peer records, timestamps.

use std::hash::Hash;

/// A 256-bit opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Draws 32 cryptographically random bytes.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// A node id with exactly bit `b` set, used to target bucket refresh.
    pub fn with_bit_set(b: usize) -> Self {
        assert!(b < crate::config::ID_BITS);
        let mut bytes = [0u8; 32];
        let byte_index = 31 - b / 8;
        let bit_in_byte = b % 8;
        bytes[byte_index] = 1 << bit_in_byte;
        Self(bytes)
    }

    /// `H(bytes) = SHA-256(bytes)` (§4.1), used to turn a `put`/`get` key
    /// into the 32-byte id the overlay actually routes on.
    pub fn hash_of(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// IPv4 and/or IPv6 address plus port, carried in a `PeerRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub v4: Option<[u8; 4]>,
    pub v6: Option<[u8; 16]>,
}

impl PeerAddr {
    pub fn v4_only(addr: [u8; 4]) -> Self {
        Self { v4: Some(addr), v6: None }
    }

    pub fn v6_only(addr: [u8; 16]) -> Self {
        Self { v4: None, v6: Some(addr) }
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_none() && self.v6.is_none()
    }

    /// Merge missing address families from `other` into a copy of `self`.
    pub fn merged_with(&self, other: &PeerAddr) -> PeerAddr {
        PeerAddr {
            v4: self.v4.or(other.v4),
            v6: self.v6.or(other.v6),
        }
    }
}

/// A peer's advertised network identity: `{ port, id, v4?, v6?, well_connected }`.
///
/// At least one of `addr.v4`/`addr.v6` must be present for a well-formed
/// record; callers that construct one from wire bytes go through
/// `crate::wire::message::decode_peer_record`, which enforces that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub port: u16,
    pub id: NodeId,
    pub addr: PeerAddr,
    /// Set once the peer has proven it answers unsolicited traffic
    /// (a PONG carrying a still-outstanding RPC_ID was received from it).
    pub well_connected: bool,
}

impl PeerRecord {
    pub fn new(id: NodeId, port: u16, addr: PeerAddr) -> Self {
        Self { port, id, addr, well_connected: false }
    }

    /// Re-insertion merge: missing address families are inherited from
    /// the prior record, `id` and `port` come from the fresher sighting.
    pub fn merge_stale(&self, prior: &PeerRecord) -> PeerRecord {
        PeerRecord {
            port: self.port,
            id: self.id,
            addr: self.addr.merged_with(&prior.addr),
            well_connected: self.well_connected || prior.well_connected,
        }
    }
}

/// Unix timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_equality() {
        let id1 = NodeId::new([1u8; 32]);
        let id2 = NodeId::new([1u8; 32]);
        let id3 = NodeId::new([2u8; 32]);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_with_bit_set_targets_correct_bucket() {
        let local = NodeId::zero();
        for b in [0usize, 1, 7, 8, 255] {
            let target = NodeId::with_bit_set(b);
            assert_eq!(
                crate::domain::services::distance::bucket_index(&local, &target),
                b
            );
        }
    }

    #[test]
    fn test_peer_addr_merge_prefers_self_fills_gaps() {
        let fresh = PeerAddr::v4_only([1, 2, 3, 4]);
        let prior = PeerAddr::v6_only([0u8; 16]);
        let merged = fresh.merged_with(&prior);
        assert_eq!(merged.v4, Some([1, 2, 3, 4]));
        assert_eq!(merged.v6, Some([0u8; 16]));
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::new(100);
        assert_eq!(ts.add_secs(50).as_secs(), 150);
        assert_eq!(ts.sub_secs(50).as_secs(), 50);
        assert_eq!(ts.sub_secs(200).as_secs(), 0);
    }
}
