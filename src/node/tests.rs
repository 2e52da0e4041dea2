use super::Node;
use crate::config::NodeConfig;

#[tokio::test]
async fn test_put_then_get_round_trips_through_a_bootstrapped_peer() {
    let port_a = 41650;
    let node_a = Node::bind(NodeConfig::for_testing(port_a)).await.unwrap();
    let node_b = Node::bind(NodeConfig::for_testing(41651)).await.unwrap();

    node_b.bootstrap("127.0.0.1", port_a).await.unwrap();

    node_a.put(b"huhu", b"haha".to_vec()).await;

    let mut found = None;
    for _ in 0..20 {
        if let Some(v) = node_b.get(b"huhu").await {
            found = Some(v);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    assert_eq!(found, Some(b"haha".to_vec()));
}

#[tokio::test]
async fn test_get_of_unknown_key_returns_none() {
    let port_a = 41660;
    let node_a = Node::bind(NodeConfig::for_testing(port_a)).await.unwrap();
    let node_b = Node::bind(NodeConfig::for_testing(41661)).await.unwrap();
    node_b.bootstrap("127.0.0.1", port_a).await.unwrap();

    assert_eq!(node_b.get(b"never-stored").await, None);
}

#[tokio::test]
async fn test_bootstrap_populates_both_routing_tables() {
    let port_a = 41670;
    let port_b = 41671;
    let node_a = Node::bind(NodeConfig::for_testing(port_a)).await.unwrap();
    let node_b = Node::bind(NodeConfig::for_testing(port_b)).await.unwrap();

    node_b.bootstrap("127.0.0.1", port_a).await.unwrap();

    assert!(node_b.table.lock().await.total_peers() > 0);

    // `a` never initiates anything; it only learns about `b` by being
    // contacted, so give its dispatch loop a moment to process the
    // corroborating PING and the FIND_NODE that follow.
    for _ in 0..20 {
        if node_a.table.lock().await.total_peers() > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert!(node_a.table.lock().await.total_peers() > 0);
}
