//! Black-box end-to-end scenarios: two real nodes on loopback, talking
//! over the actual TLS transport, bootstrap included.

use kademlia_dht::config::NodeConfig;
use kademlia_dht::node::Node;

async fn bootstrapped_pair(port_a: u16, port_b: u16) -> (std::sync::Arc<Node>, std::sync::Arc<Node>) {
    let node_a = Node::bind(NodeConfig::for_testing(port_a)).await.unwrap();
    let node_b = Node::bind(NodeConfig::for_testing(port_b)).await.unwrap();
    node_b.bootstrap("127.0.0.1", port_a).await.unwrap();
    (node_a, node_b)
}

async fn poll_get(node: &Node, key: &[u8]) -> Option<Vec<u8>> {
    for _ in 0..20 {
        if let Some(v) = node.get(key).await {
            return Some(v);
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    None
}

/// S2: an integer key is just whatever bytes the caller encodes it as —
/// `put`/`get` don't know or care that it started life as a number.
#[tokio::test]
async fn integer_key_round_trips_as_its_byte_encoding() {
    let (node_a, node_b) = bootstrapped_pair(41700, 41701).await;

    let key = 0u64.to_be_bytes();
    node_a.put(&key, b"haha".to_vec()).await;

    assert_eq!(poll_get(&node_b, &key).await, Some(b"haha".to_vec()));
}

/// S4: thirty sequential puts from A all propagate to B.
#[tokio::test]
async fn thirty_sequential_puts_all_propagate() {
    let (node_a, node_b) = bootstrapped_pair(41710, 41711).await;

    for i in 1u64..=30 {
        let key = i.to_be_bytes();
        node_a.put(&key, i.to_be_bytes().to_vec()).await;
    }

    for i in 1u64..=30 {
        let key = i.to_be_bytes();
        let got = poll_get(&node_b, &key).await;
        assert_eq!(got, Some(i.to_be_bytes().to_vec()), "key {i} did not propagate");
    }
}

/// S3: looking up a key nobody ever stored resolves to nothing, promptly.
#[tokio::test]
async fn unknown_key_resolves_to_none() {
    let (node_a, node_b) = bootstrapped_pair(41720, 41721).await;

    node_a.put(b"huhu", b"haha".to_vec()).await;

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    let mut got = node_b.get(b"blau").await;
    while got.is_some() && tokio::time::Instant::now() < deadline {
        got = node_b.get(b"blau").await;
    }
    assert_eq!(got, None);
}
