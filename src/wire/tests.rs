use super::*;
use crate::domain::entities::PeerAddr;
use crate::domain::{NodeId, PeerRecord};

fn node_id(b: u8) -> NodeId {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    NodeId::new(bytes)
}

#[test]
fn test_ping_round_trip_without_rpc_id() {
    let msg = Message::Ping { peer_id: node_id(1), rpc_id: None };
    let encoded = msg.encode();
    let decoded = Message::decode(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_find_node_round_trip() {
    let msg = Message::FindNode { peer_id: node_id(1), rpc_id: [7u8; 32], target: node_id(9) };
    let encoded = msg.encode();
    let decoded = Message::decode(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_found_nodes_round_trip_with_multiple_peers() {
    let p1 = PeerRecord::new(node_id(2), 2000, PeerAddr::v4_only([1, 2, 3, 4]));
    let p2 = PeerRecord::new(node_id(3), 2001, PeerAddr::v6_only([9u8; 16]));
    let msg = Message::FoundNodes { peer_id: node_id(1), rpc_id: [1u8; 32], nodes: vec![p1, p2] };
    let encoded = msg.encode();
    let decoded = Message::decode(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_store_round_trip() {
    let msg = Message::Store { peer_id: node_id(1), key: node_id(5), value: b"hello".to_vec() };
    let encoded = msg.encode();
    let decoded = Message::decode(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_decode_rejects_tampered_network_gate() {
    let msg = Message::FwPing { peer_id: node_id(1) };
    let mut encoded = msg.encode();
    encoded[5] ^= 0xff; // inside the gate bytes
    let err = Message::decode(&encoded).unwrap_err();
    assert_eq!(err, crate::error::WireError::BadMessage("network gate mismatch"));
}

#[test]
fn test_decode_rejects_unknown_tag() {
    let msg = Message::FwPing { peer_id: node_id(1) };
    let mut encoded = msg.encode();
    encoded[0] = 0xaa;
    let err = Message::decode(&encoded).unwrap_err();
    assert_eq!(err, crate::error::WireError::BadMessage("unknown message type"));
}

#[test]
fn test_decode_rejects_peer_record_with_no_address() {
    // An addressless record can't be built through `PeerRecord::new` + the
    // public `PeerAddr` constructors, but a malicious or buggy peer can still
    // put one on the wire, so the decoder must reject it directly.
    let addressless = PeerRecord { port: 2000, id: node_id(4), addr: PeerAddr { v4: None, v6: None }, well_connected: false };
    let pong = Message::Pong {
        peer_id: node_id(1),
        rpc_id: Some([2u8; 32]),
        all_addr: addressless,
        cli_addr: PeerRecord::new(node_id(5), 2001, PeerAddr::v4_only([2, 2, 2, 2])),
    };
    let encoded = pong.encode();
    let err = Message::decode(&encoded).unwrap_err();
    assert_eq!(
        err,
        crate::error::WireError::BadMessage("peer record has neither v4 nor v6 address")
    );
}

#[tokio::test]
async fn test_frame_round_trip() {
    let (mut a, mut b) = tokio::io::duplex(4096);
    let body = Message::FwPing { peer_id: node_id(1) }.encode();
    write_frame(&mut a, &body).await.unwrap();
    let read_back = read_frame(&mut b, 4096).await.unwrap();
    assert_eq!(read_back, body);
}

#[tokio::test]
async fn test_frame_read_rejects_oversized_message() {
    let (mut a, mut b) = tokio::io::duplex(4096);
    let body = vec![0u8; 100];
    write_frame(&mut a, &body).await.unwrap();
    let err = read_frame(&mut b, 50).await.unwrap_err();
    assert_eq!(err, crate::error::WireError::MaxSize(100));
}
