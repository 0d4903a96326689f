use serde::{Deserialize, Serialize};

use tessera_types::block::Block;

/// Result of submitting a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    pub success: bool,
    /// Id of the accepted transaction, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

/// Compact block summary for head/lookup queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    pub state_root: String,
    pub tx_root: String,
    pub timestamp: i64,
    pub proposer: String,
    pub tx_count: usize,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            height: block.header.height,
            hash: block.hash.clone(),
            prev_hash: block.header.prev_hash.clone(),
            state_root: block.header.state_root.clone(),
            tx_root: block.header.tx_root.clone(),
            timestamp: block.header.timestamp,
            proposer: block.header.proposer.clone(),
            tx_count: block.transactions.len(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub chain_id: String,
    pub height: u64,
    pub peers: usize,
    pub mempool: usize,
    pub is_validator: bool,
    pub status: String,
}
