//! The local share of the overlay's key/value space (§3 `ValueStore`).
//!
//! Volatile and unbounded by design: republish/expiry is explicitly out of
//! scope (§9's second open question), so entries live until the process
//! exits.

use std::collections::HashMap;

use crate::domain::NodeId;

#[derive(Debug, Default)]
pub struct ValueStore {
    entries: HashMap<NodeId, Vec<u8>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &NodeId) -> Option<&Vec<u8>> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: NodeId, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    pub fn contains(&self, key: &NodeId) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut store = ValueStore::new();
        let key = NodeId::new([1u8; 32]);
        assert!(store.get(&key).is_none());
        store.set(key, b"haha".to_vec());
        assert_eq!(store.get(&key), Some(&b"haha".to_vec()));
    }

    #[test]
    fn test_set_overwrites() {
        let mut store = ValueStore::new();
        let key = NodeId::new([2u8; 32]);
        store.set(key, b"first".to_vec());
        store.set(key, b"second".to_vec());
        assert_eq!(store.get(&key), Some(&b"second".to_vec()));
    }
}
