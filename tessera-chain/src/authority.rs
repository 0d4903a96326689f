use std::sync::Arc;

use tokio::sync::Mutex;

use tessera_crypto::keys::Keypair;
use tessera_runtime::{Emitter, Event, EventKind, Executor};
use tessera_storage::state_db::StateDb;
use tessera_types::block::{compute_tx_root, Block};
use tessera_types::constants::{is_genesis_hash, GENESIS_PREV_HASH, MAX_BLOCK_TIME_DRIFT_NS};

use crate::blockchain::Blockchain;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::now_ns;

/// Proof-of-authority engine. Validators propose blocks in round-robin order
/// over the configured, order-significant validator list; every replica
/// verifies the proposer schedule and signature before accepting a block.
pub struct Authority {
    chain_id: String,
    validators: Vec<String>,
    max_block_txs: usize,
    keypair: Keypair,
    pubkey_hex: String,
    chain: Arc<Blockchain>,
    state: Arc<Mutex<StateDb>>,
    mempool: Arc<Mempool>,
    executor: Arc<Executor>,
    emitter: Arc<Emitter>,
}

impl Authority {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: String,
        validators: Vec<String>,
        max_block_txs: usize,
        keypair: Keypair,
        chain: Arc<Blockchain>,
        state: Arc<Mutex<StateDb>>,
        mempool: Arc<Mempool>,
        executor: Arc<Executor>,
        emitter: Arc<Emitter>,
    ) -> Self {
        let pubkey_hex = keypair.public_key_hex();
        Self {
            chain_id,
            validators,
            max_block_txs,
            keypair,
            pubkey_hex,
            chain,
            state,
            mempool,
            executor,
            emitter,
        }
    }

    /// The validator scheduled to propose at `height`.
    pub fn proposer_for(&self, height: u64) -> Option<&str> {
        if self.validators.is_empty() {
            return None;
        }
        let idx = (height % self.validators.len() as u64) as usize;
        Some(&self.validators[idx])
    }

    /// Whether this node should propose the next block.
    pub fn is_proposer(&self) -> bool {
        self.proposer_for(self.chain.height() + 1) == Some(self.pubkey_hex.as_str())
    }

    /// This node's validator identity.
    pub fn public_key_hex(&self) -> &str {
        &self.pubkey_hex
    }

    /// Build, execute, sign, and commit the next block.
    ///
    /// The state root is computed from the dirty buffer before anything is
    /// flushed: if storing the block fails, the unflushed buffer is rolled
    /// back and the node stays consistent. The state commits only after the
    /// block is safely stored; a failure at that point cannot be rolled back
    /// and aborts the process.
    pub async fn produce_block(&self) -> Result<Block, ChainError> {
        if !self.is_proposer() {
            return Err(ChainError::NotProposer);
        }

        let txs = self.mempool.pending(self.max_block_txs);

        let (prev_hash, next_height) = match self.chain.tip() {
            Some(tip) => (tip.hash.clone(), tip.header.height + 1),
            None => (GENESIS_PREV_HASH.to_string(), 1),
        };

        let mut block = Block::new(
            &self.chain_id,
            next_height,
            &prev_hash,
            &self.pubkey_hex,
            now_ns(),
            txs,
        );

        let mut state = self.state.lock().await;
        let snap = state.snapshot();

        if let Err(e) = self.executor.execute_block(&mut state, &block) {
            state.revert_to(snap)?;
            return Err(e.into());
        }

        block.header.state_root = match state.compute_root() {
            Ok(root) => root,
            Err(e) => {
                state.revert_to(snap)?;
                return Err(e.into());
            }
        };
        block.sign(&self.keypair);

        if let Err(e) = self.chain.add_block(&block) {
            state.revert_to(snap)?;
            return Err(e);
        }

        if let Err(e) = state.commit() {
            tracing::error!(
                height = block.header.height,
                error = %e,
                "FATAL: block stored but state commit failed"
            );
            std::process::exit(1);
        }
        drop(state);

        self.emitter.emit(Event {
            kind: EventKind::BlockCommit,
            tx_id: String::new(),
            block_height: block.header.height,
            data: serde_json::json!({
                "hash": block.hash,
                "txs": block.transactions.len(),
            }),
        });

        let ids: Vec<String> = block.transactions.iter().map(|tx| tx.id.clone()).collect();
        self.mempool.remove(&ids);

        Ok(block)
    }

    /// Check that an inbound block was proposed by the scheduled validator
    /// and is internally consistent. Does not execute transactions; the
    /// syncer does that against a snapshot.
    pub fn validate_block(&self, block: &Block) -> Result<(), ChainError> {
        if self.validators.is_empty() {
            return Err(ChainError::NoValidators);
        }

        if block.header.chain_id != self.chain_id {
            return Err(ChainError::ChainIdMismatch {
                got: block.header.chain_id.clone(),
                want: self.chain_id.clone(),
            });
        }

        let expected = self
            .proposer_for(block.header.height)
            .ok_or(ChainError::NoValidators)?;
        if block.header.proposer != expected {
            return Err(ChainError::WrongProposer {
                got: block.header.proposer.clone(),
                want: expected.to_string(),
            });
        }

        // verify() recomputes the header hash before checking the signature,
        // so a tampered header cannot ride on a valid signature.
        block.verify(&block.header.proposer)?;

        let tx_root = compute_tx_root(&block.transactions);
        if block.header.tx_root != tx_root {
            return Err(ChainError::TxRootMismatch {
                got: block.header.tx_root.clone(),
                want: tx_root,
            });
        }

        let now = now_ns();
        if block.header.timestamp > now + MAX_BLOCK_TIME_DRIFT_NS {
            return Err(ChainError::BlockTimestampFuture {
                timestamp: block.header.timestamp,
                now,
            });
        }

        match self.chain.tip() {
            None => {
                if !is_genesis_hash(&block.header.prev_hash) {
                    return Err(ChainError::InvalidGenesisLink);
                }
            }
            Some(tip) => {
                if block.header.prev_hash != tip.hash {
                    return Err(ChainError::PrevHashMismatch {
                        got: block.header.prev_hash.clone(),
                        want: tip.hash.clone(),
                    });
                }
                if block.header.height != tip.header.height + 1 {
                    return Err(ChainError::HeightMismatch {
                        got: block.header.height,
                        tip: tip.header.height,
                    });
                }
                if block.header.timestamp < tip.header.timestamp {
                    return Err(ChainError::BlockTimestampBeforeTip {
                        timestamp: block.header.timestamp,
                        previous: tip.header.timestamp,
                    });
                }
            }
        }
        Ok(())
    }
}
