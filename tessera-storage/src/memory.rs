use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter, KvPairs, KvStore};

/// In-memory key-value store over an ordered map. Backs the "memory" storage
/// backend and most tests. Keys stay sorted, so `prefix_scan` hands back
/// entries in the byte order the state root enumeration expects.
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.read_lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.write_lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.write_lock().remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.read_lock().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let data = self.read_lock();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

impl BatchWriter for MemoryStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut data = self.write_lock();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
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
    fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put(b"acct:aa", b"{\"balance\":5}").unwrap();
        assert_eq!(
            store.get(b"acct:aa").unwrap(),
            Some(b"{\"balance\":5}".to_vec())
        );
        assert!(store.exists(b"acct:aa").unwrap());

        store.delete(b"acct:aa").unwrap();
        assert_eq!(store.get(b"acct:aa").unwrap(), None);
        assert!(!store.exists(b"acct:aa").unwrap());
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.put(b"chain:tip", b"h1").unwrap();
        store.put(b"chain:tip", b"h2").unwrap();
        assert_eq!(store.get(b"chain:tip").unwrap(), Some(b"h2".to_vec()));
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"missing").unwrap(), None);
        // Deleting a key that was never written is not an error.
        store.delete(b"missing").unwrap();
    }

    #[test]
    fn test_prefix_scan_is_sorted_and_bounded() {
        let store = MemoryStore::new();
        // Insert out of order across two namespaces.
        store.put(b"sess:m2", b"2").unwrap();
        store.put(b"acct:bb", b"b").unwrap();
        store.put(b"sess:m1", b"1").unwrap();
        store.put(b"acct:aa", b"a").unwrap();

        let pairs = store.prefix_scan(b"sess:").unwrap();
        let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"sess:m1".as_slice(), b"sess:m2".as_slice()]);

        assert!(store.prefix_scan(b"list:").unwrap().is_empty());
    }

    #[test]
    fn test_write_batch_applies_all_ops() {
        let store = MemoryStore::new();
        store.put(b"tmpl:old", b"x").unwrap();

        store
            .write_batch(vec![
                BatchOp::Put {
                    key: b"acct:aa".to_vec(),
                    value: b"1".to_vec(),
                },
                BatchOp::Delete {
                    key: b"tmpl:old".to_vec(),
                },
                BatchOp::Put {
                    key: b"acct:bb".to_vec(),
                    value: b"2".to_vec(),
                },
            ])
            .unwrap();

        assert_eq!(store.get(b"acct:aa").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"acct:bb").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"tmpl:old").unwrap(), None);
    }

    #[test]
    fn test_write_batch_ops_apply_in_order() {
        let store = MemoryStore::new();
        store
            .write_batch(vec![
                BatchOp::Put {
                    key: b"k".to_vec(),
                    value: b"first".to_vec(),
                },
                BatchOp::Delete { key: b"k".to_vec() },
                BatchOp::Put {
                    key: b"k".to_vec(),
                    value: b"second".to_vec(),
                },
            ])
            .unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"second".to_vec()));
    }
}
