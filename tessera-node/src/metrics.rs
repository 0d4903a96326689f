use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Node-wide Prometheus metrics.
pub struct NodeMetrics {
    pub chain_height: Gauge,
    pub peer_count: Gauge,
    pub mempool_size: Gauge,
    pub blocks_produced: Counter,
    pub blocks_synced: Counter,
    pub registry: Registry,
}

impl NodeMetrics {
    /// Create a new metrics registry with all node metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let chain_height = Gauge::default();
        let peer_count = Gauge::default();
        let mempool_size = Gauge::default();
        let blocks_produced = Counter::default();
        let blocks_synced = Counter::default();

        registry.register(
            "tessera_chain_height",
            "Current chain tip height",
            chain_height.clone(),
        );
        registry.register(
            "tessera_peer_count",
            "Number of connected peers",
            peer_count.clone(),
        );
        registry.register(
            "tessera_mempool_size",
            "Number of pending transactions in the mempool",
            mempool_size.clone(),
        );
        registry.register(
            "tessera_blocks_produced",
            "Total blocks produced by this node",
            blocks_produced.clone(),
        );
        registry.register(
            "tessera_blocks_synced",
            "Total blocks accepted from peers",
            blocks_synced.clone(),
        );

        Self {
            chain_height,
            peer_count,
            mempool_size,
            blocks_produced,
            blocks_synced,
            registry,
        }
    }

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)
            .expect("encoding metrics should not fail");
        buf
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
