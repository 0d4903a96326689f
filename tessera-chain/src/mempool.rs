use std::collections::HashMap;
use std::sync::RwLock;

use tessera_types::constants::{MAX_MEMPOOL_SIZE, MAX_TX_AGE_NS, MAX_TX_FUTURE_NS};
use tessera_types::transaction::Transaction;

use crate::error::ChainError;
use crate::now_ns;

struct PoolState {
    txs: HashMap<String, Transaction>,
    /// Insertion-ordered ids for deterministic pending iteration.
    ord: Vec<String>,
}

/// Thread-safe pending-transaction pool, bounded and deduplicated by id.
pub struct Mempool {
    inner: RwLock<PoolState>,
    max_size: usize,
}

impl Mempool {
    pub fn new() -> Self {
        Self::with_capacity(MAX_MEMPOOL_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            inner: RwLock::new(PoolState {
                txs: HashMap::new(),
                ord: Vec::new(),
            }),
            max_size,
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, PoolState> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, PoolState> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Validate and insert a transaction. Rejects an invalid signature, a
    /// timestamp outside the acceptable window (1 h past / 5 min future), a
    /// full pool, and a duplicate id.
    pub fn add(&self, tx: Transaction) -> Result<(), ChainError> {
        tx.verify()?;
        let now = now_ns();
        if now - tx.timestamp > MAX_TX_AGE_NS {
            return Err(ChainError::TransactionExpired);
        }
        if tx.timestamp - now > MAX_TX_FUTURE_NS {
            return Err(ChainError::TransactionFromFuture);
        }

        let mut pool = self.write_lock();
        if pool.txs.len() >= self.max_size {
            return Err(ChainError::MempoolFull);
        }
        if pool.txs.contains_key(&tx.id) {
            return Err(ChainError::DuplicateTransaction(tx.id));
        }
        pool.ord.push(tx.id.clone());
        pool.txs.insert(tx.id.clone(), tx);
        Ok(())
    }

    /// Look up a pending transaction by id.
    pub fn get(&self, id: &str) -> Option<Transaction> {
        self.read_lock().txs.get(id).cloned()
    }

    /// Up to `n` pending transactions in insertion order (stable copies).
    pub fn pending(&self, n: usize) -> Vec<Transaction> {
        if n == 0 {
            return Vec::new();
        }
        let pool = self.read_lock();
        let mut result = Vec::with_capacity(n.min(pool.txs.len()));
        for id in &pool.ord {
            if let Some(tx) = pool.txs.get(id) {
                result.push(tx.clone());
                if result.len() >= n {
                    break;
                }
            }
        }
        result
    }

    /// Delete transactions by id and compact the order list. Called after a
    /// block commits.
    pub fn remove(&self, ids: &[String]) {
        let mut guard = self.write_lock();
        let pool = &mut *guard;
        for id in ids {
            pool.txs.remove(id);
        }
        let txs = &pool.txs;
        pool.ord.retain(|id| txs.contains_key(id));
    }

    /// Current number of pending transactions.
    pub fn size(&self) -> usize {
        self.read_lock().txs.len()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}
