use std::sync::{Arc, RwLock};

use tessera_storage::block_store::BlockStore;
use tessera_storage::StorageError;
use tessera_types::block::Block;
use tessera_types::constants::is_genesis_hash;

use crate::error::ChainError;

struct TipState {
    tip: Option<Block>,
}

/// Manages the canonical chain: persists blocks and tracks the tip. Only tip
/// extension is supported; there is no reorganization.
pub struct Blockchain {
    store: Arc<dyn BlockStore>,
    inner: RwLock<TipState>,
}

impl Blockchain {
    /// Create a Blockchain backed by `store`. Call `init()` to load an
    /// existing chain tip from storage.
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self {
            store,
            inner: RwLock::new(TipState { tip: None }),
        }
    }

    /// Load the persisted tip from the block store.
    pub fn init(&self) -> Result<(), ChainError> {
        let tip_hash = match self.store.get_tip()? {
            Some(h) => h,
            None => return Ok(()), // fresh chain
        };
        let tip = self
            .store
            .get_block(&tip_hash)?
            .ok_or(StorageError::NotFound {
                key: format!("block:{}", tip_hash),
            })?;
        self.write_lock().tip = Some(tip);
        Ok(())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, TipState> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, TipState> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Validate height continuity and prev-hash linkage, then atomically
    /// persist the block and advance the tip. The first block of a fresh
    /// chain must reference the all-zeros genesis sentinel.
    pub fn add_block(&self, block: &Block) -> Result<(), ChainError> {
        let mut inner = self.write_lock();
        match &inner.tip {
            Some(tip) => {
                if block.header.height != tip.header.height + 1 {
                    return Err(ChainError::HeightMismatch {
                        got: block.header.height,
                        tip: tip.header.height,
                    });
                }
                if block.header.prev_hash != tip.hash {
                    return Err(ChainError::PrevHashMismatch {
                        got: block.header.prev_hash.clone(),
                        want: tip.hash.clone(),
                    });
                }
            }
            None => {
                if !is_genesis_hash(&block.header.prev_hash) {
                    return Err(ChainError::InvalidGenesisLink);
                }
            }
        }

        self.store.commit_block(block)?;
        inner.tip = Some(block.clone());
        Ok(())
    }

    /// The current chain tip, or `None` for a fresh chain.
    pub fn tip(&self) -> Option<Block> {
        self.read_lock().tip.clone()
    }

    /// Height of the current tip (0 for a fresh chain).
    pub fn height(&self) -> u64 {
        self.read_lock()
            .tip
            .as_ref()
            .map(|b| b.header.height)
            .unwrap_or(0)
    }

    pub fn get_block(&self, hash: &str) -> Result<Option<Block>, ChainError> {
        Ok(self.store.get_block(hash)?)
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ChainError> {
        Ok(self.store.get_block_by_height(height)?)
    }
}
