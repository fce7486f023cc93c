//! In-memory ordered key-value backend
//!
//! `BTreeMap` behind a `parking_lot::RwLock`. Batch application holds the
//! write lock for the whole slice, which is what makes it all-or-nothing
//! from any reader's point of view.

use crate::traits::{BatchOp, KvBackend};
use brickstore_core::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory ordered key-value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvBackend for MemoryKv {
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn apply_batch(&self, ops: &[BatchOp]) -> Result<()> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                BatchOp::Set { key, value } => {
                    map.insert(key.clone(), value.clone());
                }
                BatchOp::Delete { key } => {
                    map.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let kv = MemoryKv::new();
        kv.set(b"k", b"v").unwrap();
        assert_eq!(kv.get(b"k").unwrap(), Some(b"v".to_vec()));

        kv.delete(b"k").unwrap();
        assert_eq!(kv.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_get_absent() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_delete_absent_is_ok() {
        let kv = MemoryKv::new();
        kv.delete(b"missing").unwrap();
    }

    #[test]
    fn test_apply_batch_mixed() {
        let kv = MemoryKv::new();
        kv.set(b"gone", b"soon").unwrap();

        kv.apply_batch(&[
            BatchOp::Set {
                key: b"a".to_vec(),
                value: b"1".to_vec(),
            },
            BatchOp::Set {
                key: b"b".to_vec(),
                value: b"2".to_vec(),
            },
            BatchOp::Delete {
                key: b"gone".to_vec(),
            },
        ])
        .unwrap();

        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(kv.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(kv.get(b"gone").unwrap(), None);
        assert_eq!(kv.len(), 2);
    }

    #[test]
    fn test_set_overwrites() {
        let kv = MemoryKv::new();
        kv.set(b"k", b"old").unwrap();
        kv.set(b"k", b"new").unwrap();
        assert_eq!(kv.get(b"k").unwrap(), Some(b"new".to_vec()));
        assert_eq!(kv.len(), 1);
    }
}
