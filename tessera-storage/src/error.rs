use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("read error: {reason}")]
    ReadError { reason: String },

    #[error("write error: {reason}")]
    WriteError { reason: String },

    #[error("rocksdb error: {reason}")]
    RocksDbError { reason: String },

    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("deserialization error: {reason}")]
    DeserializationError { reason: String },

    #[error("batch error: {reason}")]
    BatchError { reason: String },

    #[error("invalid snapshot id {id} (stack depth {depth})")]
    InvalidSnapshot { id: usize, depth: usize },
}

impl StorageError {
    /// True if this error is the not-found sentinel (as opposed to an I/O or
    /// codec failure).
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDbError {
            reason: err.into_string(),
        }
    }
}
