use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatchWithTransaction};

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter, KvPairs, KvStore};

/// RocksDB-backed key-value store. Chain data, state entries, and index keys
/// share the database and are separated by key prefixes.
pub struct RocksDbStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksDbStore {
    /// Open (or create) a RocksDB store at the given path.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)?;
        Ok(Self { db })
    }
}

impl KvStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let result = self.db.get(key)?;
        Ok(result)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete(key)?;
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        let result = self.db.get(key)?;
        Ok(result.is_some())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let iter = self.db.prefix_iterator(prefix);
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::ReadError {
                reason: e.to_string(),
            })?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

impl BatchWriter for RocksDbStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut batch = WriteBatchWithTransaction::<false>::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    batch.put(&key, &value);
                }
                BatchOp::Delete { key } => {
                    batch.delete(&key);
                }
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_crud() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::new(dir.path().to_str().unwrap()).unwrap();
        let key = b"test_key";
        let value = b"test_value";

        store.put(key, value).unwrap();
        assert_eq!(store.get(key).unwrap(), Some(value.to_vec()));

        assert!(store.exists(key).unwrap());
        assert!(!store.exists(b"nonexistent").unwrap());

        store.delete(key).unwrap();
        assert_eq!(store.get(key).unwrap(), None);
    }

    #[test]
    fn test_prefix_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::new(dir.path().to_str().unwrap()).unwrap();
        store.put(b"prefix:a", b"1").unwrap();
        store.put(b"prefix:b", b"2").unwrap();
        store.put(b"other:c", b"3").unwrap();

        let results = store.prefix_scan(b"prefix:").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, b"prefix:a".to_vec());
    }

    #[test]
    fn test_batch_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::new(dir.path().to_str().unwrap()).unwrap();
        store.put(b"to_delete", b"value").unwrap();

        let ops = vec![
            BatchOp::Put {
                key: b"batch_key".to_vec(),
                value: b"batch_val".to_vec(),
            },
            BatchOp::Delete {
                key: b"to_delete".to_vec(),
            },
        ];
        store.write_batch(ops).unwrap();

        assert_eq!(store.get(b"batch_key").unwrap(), Some(b"batch_val".to_vec()));
        assert_eq!(store.get(b"to_delete").unwrap(), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        {
            let store = RocksDbStore::new(&path).unwrap();
            store.put(b"durable", b"yes").unwrap();
        }
        let store = RocksDbStore::new(&path).unwrap();
        assert_eq!(store.get(b"durable").unwrap(), Some(b"yes".to_vec()));
    }
}
