//! # Kademlia Peer Discovery & Routing
//!
//! A Kademlia-style distributed hash table: XOR-metric routing table,
//! iterative `FIND_NODE`/`FIND_VALUE` lookups, a length-framed TLS
//! transport, and the bootstrap/maintenance machinery that keeps a node's
//! routing table populated and its firewall status current.
//!
//! ## Layout
//!
//! - **`domain`:** pure Kademlia logic — node identity and the XOR metric,
//!   k-buckets, the routing table, and lookup shortlists. No I/O.
//! - **`wire`:** the message vocabulary and length-framing.
//! - **`transport`:** connection-reusing, TLS-protected message pipe with
//!   request/response correlation.
//! - **`lookup`:** the iterative lookup engine built on top of the
//!   transport and the routing table.
//! - **`node`:** the running peer — `put`/`get`, bootstrap, inbound
//!   dispatch, and the firewall probe.
//! - **`maintenance`:** the periodic background tasks that keep a running
//!   node healthy (bucket refresh, firewall re-check, RPC-state GC).
//! - **`config`:** tunable constants and `NodeConfig`.
//! - **`error`:** infrastructure-layer errors.
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use kademlia_dht::config::NodeConfig;
//! use kademlia_dht::node::Node;
//!
//! let node = Node::bind(NodeConfig::default()).await?;
//! node.bootstrap("bootstrap.example.org", 7700).await?;
//!
//! node.put(b"hello", b"world".to_vec()).await;
//! let value = node.get(b"hello").await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod lookup;
pub mod maintenance;
pub mod node;
pub mod transport;
pub mod wire;

pub use domain::{Distance, NodeId, PeerAddr, PeerRecord, RoutingTable, Timestamp};
pub use error::{DhtError, WireError};
pub use node::Node;
