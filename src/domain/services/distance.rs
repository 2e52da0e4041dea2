//! The Kademlia XOR distance metric and bucket indexing.

use crate::domain::value_objects::Distance;
use crate::domain::NodeId;

/// The full 256-bit XOR distance between two node identifiers.
pub fn xor_distance(a: &NodeId, b: &NodeId) -> Distance {
    Distance::between(a, b)
}

/// Position of the most-significant set bit of `xor_distance(local, remote)`,
/// `0` if the two ids are equal. This is the k-bucket a peer belongs in.
pub fn bucket_index(local: &NodeId, remote: &NodeId) -> usize {
    xor_distance(local, remote).bucket_index()
}

/// Fused form of `bucket_index` that avoids building an intermediate
/// `Distance` when only the bucket number is needed, for the hot path of
/// routing-table insertion.
#[inline]
pub fn bucket_for_peer(local: &NodeId, remote: &NodeId) -> usize {
    let local_bytes = local.as_bytes();
    let remote_bytes = remote.as_bytes();

    for i in 0..32 {
        let xor = local_bytes[i] ^ remote_bytes[i];
        if xor != 0 {
            let bit_in_byte = 7 - xor.leading_zeros() as usize;
            return (31 - i) * 8 + bit_in_byte;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index_matches_fused_form() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_eq!(bucket_index(&a, &b), bucket_for_peer(&a, &b));
    }

    #[test]
    fn test_identical_ids_bucket_zero() {
        let id = NodeId::random();
        assert_eq!(bucket_index(&id, &id), 0);
    }

    #[test]
    fn test_xor_distance_symmetric() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_eq!(xor_distance(&a, &b), xor_distance(&b, &a));
    }
}
