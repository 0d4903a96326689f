use std::sync::Arc;

use tessera_types::block::Block;

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter, KvStore};

const BLOCK_PREFIX: &str = "block:";
const HEIGHT_PREFIX: &str = "height:";
const TIP_KEY: &[u8] = b"chain:tip";

/// Persistence interface for the canonical chain.
pub trait BlockStore: Send + Sync {
    fn get_block(&self, hash: &str) -> Result<Option<Block>, StorageError>;
    fn put_block(&self, block: &Block) -> Result<(), StorageError>;
    fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, StorageError>;
    fn put_block_by_height(&self, height: u64, hash: &str) -> Result<(), StorageError>;
    /// Returns the current tip hash, or `None` for a fresh chain.
    fn get_tip(&self) -> Result<Option<String>, StorageError>;
    fn set_tip(&self, hash: &str) -> Result<(), StorageError>;
    /// Atomically writes the block, its height index entry, and the tip
    /// pointer in a single batch.
    fn commit_block(&self, block: &Block) -> Result<(), StorageError>;
}

/// BlockStore over a generic key-value store. Blocks are stored as JSON under
/// `block:<hash>`, the height index under `height:<height>`, and the tip
/// pointer under `chain:tip`.
pub struct KvBlockStore {
    db: Arc<dyn BatchWriter>,
}

impl KvBlockStore {
    pub fn new(db: Arc<dyn BatchWriter>) -> Self {
        Self { db }
    }

    fn encode(block: &Block) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(block).map_err(|e| StorageError::SerializationError {
            reason: e.to_string(),
        })
    }

    fn decode(data: &[u8]) -> Result<Block, StorageError> {
        serde_json::from_slice(data).map_err(|e| StorageError::DeserializationError {
            reason: e.to_string(),
        })
    }
}

impl BlockStore for KvBlockStore {
    fn get_block(&self, hash: &str) -> Result<Option<Block>, StorageError> {
        let key = format!("{}{}", BLOCK_PREFIX, hash);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(Self::decode(&data)?)),
            None => Ok(None),
        }
    }

    fn put_block(&self, block: &Block) -> Result<(), StorageError> {
        let key = format!("{}{}", BLOCK_PREFIX, block.hash);
        self.db.put(key.as_bytes(), &Self::encode(block)?)
    }

    fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, StorageError> {
        let key = format!("{}{}", HEIGHT_PREFIX, height);
        let hash = match self.db.get(key.as_bytes())? {
            Some(h) => String::from_utf8(h).map_err(|e| StorageError::DeserializationError {
                reason: e.to_string(),
            })?,
            None => return Ok(None),
        };
        self.get_block(&hash)
    }

    fn put_block_by_height(&self, height: u64, hash: &str) -> Result<(), StorageError> {
        let key = format!("{}{}", HEIGHT_PREFIX, height);
        self.db.put(key.as_bytes(), hash.as_bytes())
    }

    fn get_tip(&self) -> Result<Option<String>, StorageError> {
        match self.db.get(TIP_KEY)? {
            Some(h) => Ok(Some(String::from_utf8(h).map_err(|e| {
                StorageError::DeserializationError {
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    fn set_tip(&self, hash: &str) -> Result<(), StorageError> {
        self.db.put(TIP_KEY, hash.as_bytes())
    }

    fn commit_block(&self, block: &Block) -> Result<(), StorageError> {
        let block_key = format!("{}{}", BLOCK_PREFIX, block.hash);
        let height_key = format!("{}{}", HEIGHT_PREFIX, block.header.height);
        let ops = vec![
            BatchOp::Put {
                key: block_key.into_bytes(),
                value: Self::encode(block)?,
            },
            BatchOp::Put {
                key: height_key.into_bytes(),
                value: block.hash.as_bytes().to_vec(),
            },
            BatchOp::Put {
                key: TIP_KEY.to_vec(),
                value: block.hash.as_bytes().to_vec(),
            },
        ];
        self.db.write_batch(ops)
    }
}
