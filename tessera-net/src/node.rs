use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tokio::sync::watch;

use tessera_chain::Mempool;
use tessera_types::constants::DEFAULT_MAX_PEERS;
use tessera_types::network::{Hello, Message, MessageKind};

use crate::error::NetError;
use crate::peer::Peer;

/// Called for each received message of a registered kind.
pub type Handler = Arc<dyn Fn(Arc<Peer>, Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Listens for incoming peers, manages outgoing connections, and dispatches
/// received messages to registered handlers. One read task runs per peer;
/// a panicking handler kills only that task and drops the peer.
pub struct Node {
    node_id: String,
    listen_addr: String,
    mempool: Arc<Mempool>,
    max_peers: usize,
    peers: RwLock<HashMap<String, Arc<Peer>>>,
    handlers: RwLock<HashMap<MessageKind, Handler>>,
}

impl Node {
    /// Create a node that will listen on `listen_addr`. Transactions from
    /// peers feed the mempool through a built-in handler.
    pub fn new(node_id: &str, listen_addr: &str, mempool: Arc<Mempool>) -> Arc<Self> {
        let node = Arc::new(Self {
            node_id: node_id.to_string(),
            listen_addr: listen_addr.to_string(),
            mempool: mempool.clone(),
            max_peers: DEFAULT_MAX_PEERS,
            peers: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
        });
        node.handle(
            MessageKind::Tx,
            Arc::new(move |_peer, msg| -> BoxFuture<'static, ()> {
                let mempool = mempool.clone();
                Box::pin(async move {
                    if let Message::Tx(tx) = msg {
                        if let Err(e) = mempool.add(*tx) {
                            tracing::debug!(error = %e, "mempool add");
                        }
                    }
                })
            }),
        );
        node
    }

    /// Register a handler for a message kind, replacing any previous one.
    pub fn handle(&self, kind: MessageKind, handler: Handler) {
        let mut handlers = match self.handlers.write() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.insert(kind, handler);
    }

    /// Begin accepting connections. The accept loop runs until the shutdown
    /// channel flips.
    pub async fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), NetError> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(addr = %self.listen_addr, "p2p listening");
        let node = self.clone();
        tokio::spawn(async move {
            node.accept_loop(listener, shutdown).await;
        });
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept error");
                            continue;
                        }
                    };
                    if self.peer_count() >= self.max_peers {
                        tracing::warn!(max = self.max_peers, remote = %remote, "max peers reached, rejecting");
                        continue;
                    }
                    let id = remote.to_string();
                    let peer = Peer::new(&id, &id, stream);
                    self.insert_peer(peer.clone());
                    self.spawn_read(peer);
                }
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Dial `addr`, register the peer, and send the hello handshake.
    pub async fn add_peer(self: &Arc<Self>, id: &str, addr: &str) -> Result<Arc<Peer>, NetError> {
        let peer = Peer::connect(id, addr).await?;
        self.insert_peer(peer.clone());
        self.spawn_read(peer.clone());

        peer.send(&Message::Hello(Hello {
            node_id: self.node_id.clone(),
        }))
        .await?;
        Ok(peer)
    }

    fn insert_peer(&self, peer: Arc<Peer>) {
        let mut peers = match self.peers.write() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        peers.insert(peer.id.clone(), peer);
    }

    fn remove_peer(&self, id: &str) {
        let mut peers = match self.peers.write() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        peers.remove(id);
    }

    /// The connected peer with the given id, if any.
    pub fn peer(&self, id: &str) -> Option<Arc<Peer>> {
        match self.peers.read() {
            Ok(p) => p.get(id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(id).cloned(),
        }
    }

    /// The mempool fed by the built-in `tx` handler.
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn peer_count(&self) -> usize {
        match self.peers.read() {
            Ok(p) => p.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn peer_list(&self) -> Vec<Arc<Peer>> {
        match self.peers.read() {
            Ok(p) => p.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    /// Send `msg` to all connected peers. The peer list is copied under the
    /// read lock; the sends happen outside it.
    pub async fn broadcast(&self, msg: &Message) {
        for peer in self.peer_list() {
            if let Err(e) = peer.send(msg).await {
                tracing::warn!(peer = %peer.id, error = %e, "broadcast failed");
            }
        }
    }

    fn spawn_read(self: &Arc<Self>, peer: Arc<Peer>) {
        let node = self.clone();
        let reading = peer.clone();
        let read_task = tokio::spawn(async move {
            node.read_loop(reading).await;
        });

        // Supervisor: whether the read loop returns or panics, the peer is
        // closed and deregistered.
        let node = self.clone();
        tokio::spawn(async move {
            if read_task.await.is_err() {
                tracing::warn!(peer = %peer.id, "peer read task panicked");
            }
            peer.close().await;
            node.remove_peer(&peer.id);
            tracing::debug!(peer = %peer.id, "peer disconnected");
        });
    }

    async fn read_loop(self: Arc<Self>, peer: Arc<Peer>) {
        loop {
            let msg = match peer.receive().await {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(peer = %peer.id, error = %e, "peer read ended");
                    return;
                }
            };
            let handler = {
                let handlers = match self.handlers.read() {
                    Ok(h) => h,
                    Err(poisoned) => poisoned.into_inner(),
                };
                handlers.get(&msg.kind()).cloned()
            };
            match handler {
                Some(h) => h(peer.clone(), msg).await,
                None => tracing::debug!(kind = ?msg.kind(), "no handler for message"),
            }
        }
    }

    /// Disconnect all peers. The accept loop stops through the shutdown
    /// channel passed to `start`.
    pub async fn stop(&self) {
        for peer in self.peer_list() {
            peer.close().await;
        }
    }
}
