//! Pure domain services: the XOR metric and nearest-neighbour selection.
//!
//! Every function here is pure (no I/O, no shared state) and deterministic.

pub mod distance;
pub mod sorting;

pub use distance::{bucket_for_peer, bucket_index, xor_distance};
pub use sorting::{find_k_closest, sort_peers_by_distance};
