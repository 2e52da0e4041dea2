use super::*;
use crate::domain::entities::PeerAddr;
use std::time::Duration;

fn node(b: u8) -> NodeId {
    NodeId::new([b; 32])
}

fn peer(b: u8) -> PeerRecord {
    PeerRecord::new(node(b), 10000 + b as u16, PeerAddr::v4_only([127, 0, 0, 1]))
}

#[test]
fn test_update_orders_by_distance_to_target() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    sl.update(vec![peer(0x80), peer(0x01), peer(0x40)]);
    let results = sl.results();
    assert_eq!(results[0].id, node(0x01));
    assert_eq!(results[2].id, node(0x80));
}

#[test]
fn test_update_ignores_target_and_self() {
    let sl = Shortlist::new(20, node(0x42), node(0xaa));
    sl.update(vec![peer(0x42), peer(0xaa), peer(0x10)]);
    let results = sl.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, node(0x10));
}

#[test]
fn test_update_deduplicates() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    sl.update(vec![peer(0x01)]);
    sl.update(vec![peer(0x01)]);
    assert_eq!(sl.results().len(), 1);
}

#[test]
fn test_truncates_to_k() {
    let sl = Shortlist::new(2, node(0), node(0xff));
    sl.update((1u8..=10).map(peer));
    assert_eq!(sl.results().len(), 2);
}

#[test]
fn test_next_iteration_marks_queried_and_respects_alpha() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    sl.update((1u8..=5).map(peer));
    let batch = sl.next_iteration(3);
    assert_eq!(batch.len(), 3);
    let second = sl.next_iteration(3);
    assert_eq!(second.len(), 2);
    assert!(sl.next_iteration(3).is_empty());
}

#[test]
fn test_complete_when_all_queried() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    sl.update(vec![peer(1), peer(2)]);
    assert!(!sl.complete());
    sl.next_iteration(20);
    assert!(sl.complete());
}

#[test]
fn test_empty_shortlist_is_complete() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    assert!(sl.complete());
}

#[tokio::test]
async fn test_set_complete_resolves_completion_result() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    sl.set_complete(Some(b"value".to_vec()));
    let result = sl.completion_result(Duration::from_millis(50)).await;
    assert_eq!(result, Some(b"value".to_vec()));
}

#[tokio::test]
async fn test_completion_result_times_out_to_none() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    let result = sl.completion_result(Duration::from_millis(20)).await;
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_update_after_completion_is_ignored() {
    let sl = Shortlist::new(20, node(0), node(0xff));
    sl.set_complete(Some(b"v".to_vec()));
    sl.update(vec![peer(1)]);
    assert!(sl.results().is_empty());
}
