//! Nearest-neighbour selection, firewall-penalty aware.

use super::distance::xor_distance;
use crate::domain::{NodeId, PeerRecord};

/// Sort peers by XOR distance from a target node (closest first). Ties
/// keep their relative input order (a stable sort), matching the
/// shortlist's "equal-distance peers ordered by insertion time" tie-break.
pub fn sort_peers_by_distance(peers: &[PeerRecord], target: &NodeId) -> Vec<PeerRecord> {
    let mut sorted = peers.to_vec();
    sorted.sort_by(|a, b| xor_distance(&a.id, target).cmp(&xor_distance(&b.id, target)));
    sorted
}

/// Nearest-neighbour selection for routing-table queries: orders peers by
/// the composite score `XOR(key, peer.id) + (0 if well_connected else
/// FW_PENALTY)`. Since `FW_PENALTY` strictly dominates any XOR distance,
/// this is equivalent to sorting first by "is this peer firewalled" and
/// only then by raw distance.
pub fn find_k_closest(peers: &[PeerRecord], target: &NodeId, k: usize) -> Vec<PeerRecord> {
    let mut scored: Vec<PeerRecord> = peers.to_vec();
    scored.sort_by(|a, b| {
        let penalty_a = !a.well_connected;
        let penalty_b = !b.well_connected;
        penalty_a
            .cmp(&penalty_b)
            .then_with(|| xor_distance(&a.id, target).cmp(&xor_distance(&b.id, target)))
    });
    scored.into_iter().take(k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PeerAddr;

    fn peer(id_byte: u8, well_connected: bool) -> PeerRecord {
        let mut rec = PeerRecord::new(
            NodeId::new([id_byte; 32]),
            10000 + id_byte as u16,
            PeerAddr::v4_only([127, 0, 0, 1]),
        );
        rec.well_connected = well_connected;
        rec
    }

    #[test]
    fn test_sort_peers_by_distance_closest_first() {
        let target = NodeId::new([0u8; 32]);
        let peers = vec![peer(0xff, true), peer(0x01, true), peer(0x80, true)];
        let sorted = sort_peers_by_distance(&peers, &target);
        assert_eq!(sorted[0].id, NodeId::new([0x01; 32]));
        assert_eq!(sorted[2].id, NodeId::new([0xff; 32]));
    }

    #[test]
    fn test_firewall_penalty_sorts_well_connected_first() {
        let target = NodeId::new([0u8; 32]);
        // fw peer is numerically closer to target than the well-connected one
        let fw = peer(0x01, false);
        let wc = peer(0x80, true);
        let result = find_k_closest(&[fw.clone(), wc.clone()], &target, 1);
        assert_eq!(result, vec![wc]);
    }

    #[test]
    fn test_find_k_closest_truncates() {
        let target = NodeId::new([0u8; 32]);
        let peers: Vec<PeerRecord> = (1u8..=5).map(|b| peer(b, true)).collect();
        let result = find_k_closest(&peers, &target, 2);
        assert_eq!(result.len(), 2);
    }
}
