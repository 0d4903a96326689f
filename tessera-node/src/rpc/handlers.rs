use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::{INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};
use jsonrpsee::types::ErrorObjectOwned;
use tokio::sync::Mutex;

use tessera_chain::{Blockchain, ChainError, Mempool};
use tessera_net::Node as NetNode;
use tessera_storage::state_db::StateDb;
use tessera_storage::StorageError;
use tessera_types::block::Block;
use tessera_types::network::Message;
use tessera_types::state::{Account, Asset, AssetTemplate, MarketListing, Session};
use tessera_types::transaction::Transaction;

use super::types::{BlockInfo, HealthInfo, SubmitResult};
use crate::indexer::Indexer;
use crate::metrics::NodeMetrics;

/// JSON-RPC surface of the tessera node.
#[rpc(server)]
pub trait TesseraRpc {
    /// Submit a signed transaction to the mempool and broadcast it.
    #[method(name = "tessera_sendTransaction")]
    async fn send_transaction(&self, tx: Transaction) -> Result<SubmitResult, ErrorObjectOwned>;

    /// Get an account by pubkey hex (zero-value for unknown addresses).
    #[method(name = "tessera_getAccount")]
    async fn get_account(&self, address: String) -> Result<Account, ErrorObjectOwned>;

    /// Get an asset by id.
    #[method(name = "tessera_getAsset")]
    async fn get_asset(&self, id: String) -> Result<Option<Asset>, ErrorObjectOwned>;

    /// Get an asset template by id.
    #[method(name = "tessera_getTemplate")]
    async fn get_template(&self, id: String) -> Result<Option<AssetTemplate>, ErrorObjectOwned>;

    /// Get a game session by id.
    #[method(name = "tessera_getSession")]
    async fn get_session(&self, id: String) -> Result<Option<Session>, ErrorObjectOwned>;

    /// Get a market listing by id.
    #[method(name = "tessera_getListing")]
    async fn get_listing(&self, id: String) -> Result<Option<MarketListing>, ErrorObjectOwned>;

    /// Get a full block by hash.
    #[method(name = "tessera_getBlock")]
    async fn get_block(&self, hash: String) -> Result<Option<Block>, ErrorObjectOwned>;

    /// Get a full block by height.
    #[method(name = "tessera_getBlockByHeight")]
    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ErrorObjectOwned>;

    /// Summary of the current chain tip.
    #[method(name = "tessera_head")]
    async fn head(&self) -> Result<Option<BlockInfo>, ErrorObjectOwned>;

    /// Number of pending transactions.
    #[method(name = "tessera_mempoolSize")]
    async fn mempool_size(&self) -> Result<usize, ErrorObjectOwned>;

    /// Asset ids owned by the given pubkey (indexer query).
    #[method(name = "tessera_getAssetsByOwner")]
    async fn get_assets_by_owner(&self, owner: String) -> Result<Vec<String>, ErrorObjectOwned>;

    /// Session ids the given player participated in (indexer query).
    #[method(name = "tessera_getSessionsByPlayer")]
    async fn get_sessions_by_player(&self, player: String)
        -> Result<Vec<String>, ErrorObjectOwned>;

    /// Node health summary.
    #[method(name = "tessera_health")]
    async fn health(&self) -> Result<HealthInfo, ErrorObjectOwned>;

    /// Node metrics in Prometheus text exposition format.
    #[method(name = "tessera_getMetrics")]
    async fn get_metrics(&self) -> Result<String, ErrorObjectOwned>;
}

pub struct TesseraRpcImpl {
    pub chain_id: String,
    pub is_validator: bool,
    pub chain: Arc<Blockchain>,
    pub state: Arc<Mutex<StateDb>>,
    pub mempool: Arc<Mempool>,
    pub net: Arc<NetNode>,
    pub indexer: Arc<Indexer>,
    pub metrics: Arc<NodeMetrics>,
}

fn invalid_params(msg: impl ToString) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INVALID_PARAMS_CODE, msg.to_string(), None::<()>)
}

fn internal(msg: impl ToString) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INTERNAL_ERROR_CODE, msg.to_string(), None::<()>)
}

/// Map a state lookup to `Ok(None)` on not-found and an internal error
/// otherwise.
fn optional<T>(result: Result<T, StorageError>) -> Result<Option<T>, ErrorObjectOwned> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(internal(e)),
    }
}

#[async_trait]
impl TesseraRpcServer for TesseraRpcImpl {
    async fn send_transaction(&self, tx: Transaction) -> Result<SubmitResult, ErrorObjectOwned> {
        if tx.chain_id != self.chain_id {
            return Err(invalid_params(format!(
                "chain id mismatch: got {:?} want {:?}",
                tx.chain_id, self.chain_id
            )));
        }
        let tx_id = tx.id.clone();
        self.mempool.add(tx.clone()).map_err(|e| match e {
            ChainError::Storage(inner) => internal(inner),
            other => invalid_params(other),
        })?;

        self.net.broadcast(&Message::Tx(Box::new(tx))).await;

        Ok(SubmitResult {
            success: true,
            tx_id: Some(tx_id),
        })
    }

    async fn get_account(&self, address: String) -> Result<Account, ErrorObjectOwned> {
        let state = self.state.lock().await;
        state.get_account(&address).map_err(internal)
    }

    async fn get_asset(&self, id: String) -> Result<Option<Asset>, ErrorObjectOwned> {
        let state = self.state.lock().await;
        optional(state.get_asset(&id))
    }

    async fn get_template(&self, id: String) -> Result<Option<AssetTemplate>, ErrorObjectOwned> {
        let state = self.state.lock().await;
        optional(state.get_template(&id))
    }

    async fn get_session(&self, id: String) -> Result<Option<Session>, ErrorObjectOwned> {
        let state = self.state.lock().await;
        optional(state.get_session(&id))
    }

    async fn get_listing(&self, id: String) -> Result<Option<MarketListing>, ErrorObjectOwned> {
        let state = self.state.lock().await;
        optional(state.get_listing(&id))
    }

    async fn get_block(&self, hash: String) -> Result<Option<Block>, ErrorObjectOwned> {
        self.chain.get_block(&hash).map_err(internal)
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, ErrorObjectOwned> {
        self.chain.get_block_by_height(height).map_err(internal)
    }

    async fn head(&self) -> Result<Option<BlockInfo>, ErrorObjectOwned> {
        Ok(self.chain.tip().as_ref().map(BlockInfo::from))
    }

    async fn mempool_size(&self) -> Result<usize, ErrorObjectOwned> {
        Ok(self.mempool.size())
    }

    async fn get_assets_by_owner(&self, owner: String) -> Result<Vec<String>, ErrorObjectOwned> {
        self.indexer.assets_by_owner(&owner).map_err(internal)
    }

    async fn get_sessions_by_player(
        &self,
        player: String,
    ) -> Result<Vec<String>, ErrorObjectOwned> {
        self.indexer.sessions_by_player(&player).map_err(internal)
    }

    async fn health(&self) -> Result<HealthInfo, ErrorObjectOwned> {
        Ok(HealthInfo {
            chain_id: self.chain_id.clone(),
            height: self.chain.height(),
            peers: self.net.peer_count(),
            mempool: self.mempool.size(),
            is_validator: self.is_validator,
            status: "ok".to_string(),
        })
    }

    async fn get_metrics(&self) -> Result<String, ErrorObjectOwned> {
        Ok(self.metrics.encode())
    }
}
