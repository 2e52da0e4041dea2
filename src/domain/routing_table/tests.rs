use super::*;
use crate::domain::entities::PeerAddr;
use crate::domain::errors::RoutingTableError;
use crate::domain::services::bucket_index;
use crate::domain::{NodeId, PeerRecord};

fn node_id(b: u8) -> NodeId {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    NodeId::new(bytes)
}

fn peer(b: u8, port: u16) -> PeerRecord {
    PeerRecord::new(node_id(b), port, PeerAddr::v4_only([127, 0, 0, 1]))
}

#[test]
fn test_no_self_insert() {
    let local = node_id(0xaa);
    let mut table = RoutingTable::new(local, 20);
    let err = table.insert(peer(0xaa, 1), false).unwrap_err();
    assert_eq!(err, RoutingTableError::SelfInsert);
    assert_eq!(table.total_peers(), 0);
}

#[test]
fn test_bucket_placement_matches_bucket_index() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 20);
    for b in [1u8, 2, 3, 0x80] {
        table.insert(peer(b, 1000 + b as u16), true).unwrap();
    }
    for i in 0..table.num_buckets() {
        for p in table.bucket(i).peers() {
            assert_eq!(bucket_index(&local, &p.id), i);
        }
    }
}

#[test]
fn test_bucket_bound_never_exceeds_k() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 4);
    // All these collide into bucket 0 (top bit set, rest zero, distinct low bits).
    for i in 0u8..10 {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1000_0000;
        bytes[31] = i;
        let p = PeerRecord::new(NodeId::new(bytes), 1000 + i as u16, PeerAddr::v4_only([127, 0, 0, 1]));
        table.insert(p, false).unwrap();
    }
    assert!(table.bucket(255).len() <= 4);
}

#[test]
fn test_appended_when_room() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 20);
    let outcome = table.insert(peer(1, 1000), false).unwrap();
    assert_eq!(outcome, InsertOutcome::Appended);
}

#[test]
fn test_merge_moves_to_tail_and_keeps_addr() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 20);
    table.insert(peer(1, 1000), false).unwrap();
    let mut updated = peer(1, 1000);
    updated.addr.v4 = None;
    updated.addr.v6 = Some([9u8; 16]);
    let outcome = table.insert(updated, false).unwrap();
    assert_eq!(outcome, InsertOutcome::Merged);
    let b = bucket_index(&local, &node_id(1));
    let stored = &table.bucket(b).peers()[0];
    assert_eq!(stored.addr.v4, Some([127, 0, 0, 1]));
    assert_eq!(stored.addr.v6, Some([9u8; 16]));
}

fn fill_bucket_zero(table: &mut RoutingTable, local: &NodeId, k: usize) -> Vec<NodeId> {
    let mut ids = Vec::new();
    for i in 0u8..k as u8 {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1000_0000;
        bytes[31] = i + 1;
        let id = NodeId::new(bytes);
        table
            .insert(PeerRecord::new(id, 1000 + i as u16, PeerAddr::v4_only([127, 0, 0, 1])), true)
            .unwrap();
        ids.push(id);
    }
    ids
}

#[test]
fn test_unsolicited_eviction_reinserts_at_k_over_4() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 20);
    let ids = fill_bucket_zero(&mut table, &local, 20);

    let mut newcomer_bytes = [0u8; 32];
    newcomer_bytes[0] = 0b1000_0000;
    newcomer_bytes[31] = 200;

    let b = bucket_index(&local, &ids[0]);
    let outcome = table.insert(
        PeerRecord::new(NodeId::new(newcomer_bytes), 5000, PeerAddr::v4_only([1, 2, 3, 4])),
        true,
    ).unwrap();
    match outcome {
        InsertOutcome::EvictedSolicited { evicted } => {
            assert_eq!(evicted.id, ids[19]); // tail evicted
        }
        other => panic!("expected EvictedSolicited, got {other:?}"),
    }
    let peers = table.bucket(b).peers();
    assert_eq!(peers[crate::config::EVICTION_REINSERT_INDEX].id, NodeId::new(newcomer_bytes));
}

#[test]
fn test_unproven_insert_challenges_head() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 20);
    let ids = fill_bucket_zero(&mut table, &local, 20);

    let mut newcomer_bytes = [0u8; 32];
    newcomer_bytes[0] = 0b1000_0000;
    newcomer_bytes[31] = 201;
    let outcome = table.insert(
        PeerRecord::new(NodeId::new(newcomer_bytes), 5001, PeerAddr::v4_only([1, 2, 3, 4])),
        false,
    ).unwrap();
    match outcome {
        InsertOutcome::ChallengeHead { challenge } => assert_eq!(challenge.id, ids[0]),
        other => panic!("expected ChallengeHead, got {other:?}"),
    }
    let b = bucket_index(&local, &ids[0]);
    assert!(table.bucket(b).contains(&NodeId::new(newcomer_bytes)));
    assert!(!table.bucket(b).contains(&ids[0]));
}

#[test]
fn test_firewall_penalty_in_nearest() {
    let local = node_id(0);
    let mut table = RoutingTable::new(local, 20);
    let target = node_id(0);

    let mut fw_bytes = [0u8; 32];
    fw_bytes[31] = 0x01;
    let fw = PeerRecord::new(NodeId::new(fw_bytes), 1, PeerAddr::v4_only([1, 1, 1, 1]));
    table.insert(fw, false).unwrap();

    let mut wc_bytes = [0u8; 32];
    wc_bytes[0] = 0x80;
    let wc = PeerRecord::new(NodeId::new(wc_bytes), 2, PeerAddr::v4_only([2, 2, 2, 2]));
    table.insert(wc, true).unwrap();
    table.mark_well_connected(&NodeId::new(wc_bytes));

    let nearest = table.nearest(&target, 1);
    assert_eq!(nearest[0].id, NodeId::new(wc_bytes));
}
