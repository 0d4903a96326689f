use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::server::ServerHandle;
use tokio::sync::{watch, Mutex};

use tessera_chain::{Authority, Blockchain, Mempool};
use tessera_crypto::keys::Keypair;
use tessera_net::{Node as NetNode, Syncer};
use tessera_runtime::{Emitter, Executor};
use tessera_storage::block_store::KvBlockStore;
use tessera_storage::memory::MemoryStore;
use tessera_storage::rocksdb::RocksDbStore;
use tessera_storage::state_db::StateDb;
use tessera_storage::traits::BatchWriter;
use tessera_types::network::Message;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::genesis;
use crate::indexer::Indexer;
use crate::metrics::NodeMetrics;
use crate::rpc::handlers::TesseraRpcImpl;
use crate::rpc::server::start_rpc_server;

/// Create a storage backend from the node configuration.
fn create_store(config: &NodeConfig) -> Result<Arc<dyn BatchWriter>, NodeError> {
    match config.storage.db_type.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "rocksdb" => {
            let data_dir = std::path::Path::new(&config.storage.data_dir);
            std::fs::create_dir_all(data_dir)?;
            let db_path = data_dir.join("chain");
            let store = RocksDbStore::new(db_path.to_str().unwrap_or("chain"))?;
            Ok(Arc::new(store))
        }
        other => Err(NodeError::Config {
            reason: format!(
                "unknown storage backend '{}', expected 'memory' or 'rocksdb'",
                other
            ),
        }),
    }
}

/// The node ties every subsystem together: storage, state, chain, mempool,
/// consensus, networking, indexing, and RPC.
pub struct Node {
    config: NodeConfig,
    chain: Arc<Blockchain>,
    state: Arc<Mutex<StateDb>>,
    mempool: Arc<Mempool>,
    authority: Arc<Authority>,
    net: Arc<NetNode>,
    syncer: Arc<Syncer>,
    indexer: Arc<Indexer>,
    metrics: Arc<NodeMetrics>,
    rpc_handle: Option<ServerHandle>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Node {
    /// Build all subsystems from the configuration and create the genesis
    /// block if the chain is fresh.
    pub async fn new(config: NodeConfig, keypair: Keypair) -> Result<Self, NodeError> {
        config.validate()?;

        let store = create_store(&config)?;
        let chain = Arc::new(Blockchain::new(Arc::new(KvBlockStore::new(store.clone()))));
        chain.init()?;
        let state = Arc::new(Mutex::new(StateDb::new(store.clone())));

        if chain.tip().is_none() {
            let proposer = config.consensus.validators[0].clone();
            let genesis_block = {
                let mut state = state.lock().await;
                genesis::create_genesis_block(&config.genesis, &proposer, &mut state, &keypair)?
            };
            chain.add_block(&genesis_block)?;
            tracing::info!(hash = %genesis_block.hash, "genesis block committed");
        }

        let emitter = Arc::new(Emitter::new());
        let indexer = Indexer::new(store.clone());
        indexer.attach(&emitter);

        let mempool = Arc::new(Mempool::new());
        let executor = Arc::new(Executor::new(emitter.clone()));
        let authority = Arc::new(Authority::new(
            config.genesis.chain_id.clone(),
            config.consensus.validators.clone(),
            config.consensus.max_block_txs,
            keypair,
            chain.clone(),
            state.clone(),
            mempool.clone(),
            executor.clone(),
            emitter.clone(),
        ));

        let net = NetNode::new(&config.node_id, &config.network.listen_addr, mempool.clone());
        let syncer = Syncer::new(
            chain.clone(),
            authority.clone(),
            executor,
            state.clone(),
        );
        syncer.register(&net);

        let metrics = Arc::new(NodeMetrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            chain,
            state,
            mempool,
            authority,
            net,
            syncer,
            indexer,
            metrics,
            rpc_handle: None,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Start the network listener, seed connections, RPC server, and the
    /// consensus tick task. Returns once everything is running.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.net.start(self.shutdown_rx.clone()).await?;

        for seed in &self.config.network.seed_peers {
            match self.net.add_peer(&seed.id, &seed.addr).await {
                Ok(peer) => {
                    // Catch up from the newly connected peer right away.
                    let from = self.chain.height() + 1;
                    if let Err(e) = self.syncer.request_blocks(&peer, from).await {
                        tracing::warn!(peer = %seed.id, error = %e, "initial sync request failed");
                    }
                    tracing::info!(peer = %seed.id, addr = %seed.addr, "connected to seed peer");
                }
                Err(e) => {
                    tracing::warn!(peer = %seed.id, addr = %seed.addr, error = %e, "seed peer connect failed");
                }
            }
        }

        if self.config.rpc.enabled {
            let is_validator = self
                .config
                .consensus
                .validators
                .iter()
                .any(|v| v == self.authority.public_key_hex());
            let rpc = TesseraRpcImpl {
                chain_id: self.config.genesis.chain_id.clone(),
                is_validator,
                chain: self.chain.clone(),
                state: self.state.clone(),
                mempool: self.mempool.clone(),
                net: self.net.clone(),
                indexer: self.indexer.clone(),
                metrics: self.metrics.clone(),
            };
            let handle = start_rpc_server(
                &self.config.rpc.listen_addr,
                rpc,
                self.config.rpc.auth_token.clone(),
            )
            .await?;
            self.rpc_handle = Some(handle);
        }

        self.spawn_consensus_tick();

        tracing::info!(
            validator = %self.authority.public_key_hex(),
            chain_id = %self.config.genesis.chain_id,
            "node running"
        );
        Ok(())
    }

    /// Dedicated consensus tick task: on each tick, produce a block if this
    /// node is the scheduled proposer, then refresh the gauges.
    fn spawn_consensus_tick(&self) {
        let authority = self.authority.clone();
        let net = self.net.clone();
        let chain = self.chain.clone();
        let mempool = self.mempool.clone();
        let metrics = self.metrics.clone();
        let mut shutdown = self.shutdown_rx.clone();
        let interval_ms = self.config.consensus.block_interval_ms;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if authority.is_proposer() {
                            match authority.produce_block().await {
                                Ok(block) => {
                                    tracing::info!(
                                        height = block.header.height,
                                        txs = block.transactions.len(),
                                        "produced block"
                                    );
                                    metrics.blocks_produced.inc();
                                    net.broadcast(&Message::Block(Box::new(block))).await;
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "produce block failed");
                                }
                            }
                        }
                        metrics.chain_height.set(chain.height() as i64);
                        metrics.mempool_size.set(mempool.size() as i64);
                        metrics.peer_count.set(net.peer_count() as i64);
                    }
                    _ = shutdown.changed() => return,
                }
            }
        });
    }

    /// Start everything and block until Ctrl-C, then shut down.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        self.start().await?;
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown signal received");
        self.shutdown().await
    }

    /// Stop the consensus ticker and accept loop, the RPC server, and all
    /// peer connections.
    pub async fn shutdown(&mut self) -> Result<(), NodeError> {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.rpc_handle.take() {
            handle.stop().map_err(|e| NodeError::Rpc {
                reason: format!("failed to stop RPC server: {}", e),
            })?;
        }
        self.net.stop().await;
        tracing::info!("node shutdown complete");
        Ok(())
    }

    // ---- accessors (used by tests and the RPC layer) ----

    pub fn chain(&self) -> &Arc<Blockchain> {
        &self.chain
    }

    pub fn state(&self) -> &Arc<Mutex<StateDb>> {
        &self.state
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn authority(&self) -> &Arc<Authority> {
        &self.authority
    }

    pub fn net(&self) -> &Arc<NetNode> {
        &self.net
    }

    pub fn syncer(&self) -> &Arc<Syncer> {
        &self.syncer
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }
}
