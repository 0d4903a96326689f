use std::sync::Arc;

use tokio::sync::Mutex;

use tessera_chain::{Authority, Blockchain, ChainError};
use tessera_runtime::Executor;
use tessera_storage::state_db::StateDb;
use tessera_types::block::Block;
use tessera_types::constants::{MAX_SYNC_BATCH_LIMIT, SYNC_BATCH_LIMIT};
use tessera_types::network::{BlocksResponse, GetBlocksRequest, Message, MessageKind};

use futures::future::BoxFuture;

use crate::error::NetError;
use crate::node::Node;
use crate::peer::Peer;

/// Validates a block before it is accepted into the chain. The syncer only
/// needs this capability from consensus; the concrete engine is injected so
/// the sync layer never depends on how validation is implemented.
pub trait BlockValidator: Send + Sync {
    fn validate_block(&self, block: &Block) -> Result<(), ChainError>;
}

impl BlockValidator for Authority {
    fn validate_block(&self, block: &Block) -> Result<(), ChainError> {
        Authority::validate_block(self, block)
    }
}

/// Handles block synchronization between nodes: serves `get_blocks` range
/// requests and applies received batches with validate-execute-verify-commit
/// semantics, reverting state on any failure.
pub struct Syncer {
    chain: Arc<Blockchain>,
    validator: Arc<dyn BlockValidator>,
    executor: Arc<Executor>,
    state: Arc<Mutex<StateDb>>,
}

impl Syncer {
    pub fn new(
        chain: Arc<Blockchain>,
        validator: Arc<dyn BlockValidator>,
        executor: Arc<Executor>,
        state: Arc<Mutex<StateDb>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            chain,
            validator,
            executor,
            state,
        })
    }

    /// Register the sync message handlers on `node`. A `hello` from a peer
    /// immediately triggers a catch-up request from our tip.
    pub fn register(self: &Arc<Self>, node: &Arc<Node>) {
        let syncer = self.clone();
        node.handle(
            MessageKind::GetBlocks,
            Arc::new(move |peer, msg| -> BoxFuture<'static, ()> {
                let syncer = syncer.clone();
                Box::pin(async move {
                    if let Message::GetBlocks(req) = msg {
                        syncer.handle_get_blocks(peer, req).await;
                    }
                })
            }),
        );

        let syncer = self.clone();
        node.handle(
            MessageKind::Blocks,
            Arc::new(move |peer, msg| -> BoxFuture<'static, ()> {
                let syncer = syncer.clone();
                Box::pin(async move {
                    if let Message::Blocks(resp) = msg {
                        syncer.handle_blocks(peer, resp).await;
                    }
                })
            }),
        );

        let syncer = self.clone();
        node.handle(
            MessageKind::Hello,
            Arc::new(move |peer, msg| -> BoxFuture<'static, ()> {
                let syncer = syncer.clone();
                Box::pin(async move {
                    if let Message::Hello(hello) = msg {
                        tracing::debug!(peer = %peer.id, node_id = %hello.node_id, "peer hello");
                        let from = syncer.chain.height() + 1;
                        if let Err(e) = syncer.request_blocks(&peer, from).await {
                            tracing::warn!(peer = %peer.id, error = %e, "sync kickoff failed");
                        }
                    }
                })
            }),
        );

        let syncer = self.clone();
        node.handle(
            MessageKind::Block,
            Arc::new(move |peer, msg| -> BoxFuture<'static, ()> {
                let syncer = syncer.clone();
                Box::pin(async move {
                    if let Message::Block(block) = msg {
                        if let Err(e) = syncer.apply_block(&block).await {
                            tracing::warn!(
                                peer = %peer.id,
                                height = block.header.height,
                                error = %e,
                                "rejecting broadcast block"
                            );
                        }
                    }
                })
            }),
        );
    }

    /// Ask `peer` for blocks starting at `from_height`.
    pub async fn request_blocks(&self, peer: &Peer, from_height: u64) -> Result<(), NetError> {
        peer.send(&Message::GetBlocks(GetBlocksRequest {
            from_height,
            limit: SYNC_BATCH_LIMIT,
        }))
        .await
    }

    /// Collect up to `limit` consecutive blocks starting at `from_height`,
    /// truncating at the first missing height. An out-of-range limit falls
    /// back to the default batch size.
    pub fn collect_blocks(&self, req: GetBlocksRequest) -> BlocksResponse {
        let mut limit = req.limit;
        if limit < 1 || limit > MAX_SYNC_BATCH_LIMIT {
            limit = SYNC_BATCH_LIMIT;
        }
        let mut blocks = Vec::new();
        for height in req.from_height..req.from_height.saturating_add(limit as u64) {
            match self.chain.get_block_by_height(height) {
                Ok(Some(block)) => blocks.push(block),
                _ => break,
            }
        }
        BlocksResponse { blocks }
    }

    async fn handle_get_blocks(&self, peer: Arc<Peer>, req: GetBlocksRequest) {
        let resp = self.collect_blocks(req);
        if let Err(e) = peer.send(&Message::Blocks(resp)).await {
            tracing::warn!(peer = %peer.id, error = %e, "sending blocks failed");
        }
    }

    async fn handle_blocks(&self, peer: Arc<Peer>, resp: BlocksResponse) {
        let batch_size = resp.blocks.len();
        for block in resp.blocks {
            if let Err(e) = self.apply_block(&block).await {
                // Subsequent blocks chain from the rejected one; drop the
                // rest of this batch.
                tracing::warn!(
                    peer = %peer.id,
                    height = block.header.height,
                    error = %e,
                    "synced block rejected, dropping rest of batch"
                );
                return;
            }
            tracing::debug!(height = block.header.height, "synced block applied");
        }

        // A full batch means the peer likely has more; keep pulling.
        if batch_size >= SYNC_BATCH_LIMIT as usize {
            let from = self.chain.height() + 1;
            if let Err(e) = self.request_blocks(&peer, from).await {
                tracing::warn!(peer = %peer.id, error = %e, "follow-up range request failed");
            }
        }
    }

    /// Validate and apply a single received block: header checks through the
    /// injected validator, execution against a state snapshot, state-root
    /// comparison, then atomic chain commit followed by the state flush.
    /// Any failure before the chain commit reverts the snapshot; a state
    /// flush failure after the block is persisted is unrecoverable.
    pub async fn apply_block(&self, block: &Block) -> Result<(), ChainError> {
        self.validator.validate_block(block)?;

        let mut state = self.state.lock().await;
        let snap = state.snapshot();

        if let Err(e) = self.executor.execute_block(&mut state, block) {
            state.revert_to(snap)?;
            return Err(e.into());
        }

        let root = match state.compute_root() {
            Ok(root) => root,
            Err(e) => {
                state.revert_to(snap)?;
                return Err(e.into());
            }
        };
        if !block.header.state_root.is_empty() && root != block.header.state_root {
            state.revert_to(snap)?;
            return Err(ChainError::StateRootMismatch {
                got: root,
                want: block.header.state_root.clone(),
            });
        }

        if let Err(e) = self.chain.add_block(block) {
            state.revert_to(snap)?;
            return Err(e);
        }

        if let Err(e) = state.commit() {
            tracing::error!(
                height = block.header.height,
                error = %e,
                "FATAL: synced block stored but state commit failed"
            );
            std::process::exit(1);
        }
        Ok(())
    }
}
