use std::path::Path;

use serde::{Deserialize, Serialize};

use tessera_types::constants::{DEFAULT_BLOCK_INTERVAL_MS, DEFAULT_MAX_BLOCK_TXS};
use tessera_types::genesis::GenesisConfig;

use crate::error::NodeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub consensus: ConsensusConfig,
    pub rpc: RpcConfig,
    pub logging: LoggingConfig,
    pub genesis: GenesisConfig,
}

fn default_node_id() -> String {
    "node0".to_string()
}

/// A remote node to connect to on startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPeer {
    pub id: String,
    /// host:port
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen_addr: String,
    #[serde(default)]
    pub seed_peers: Vec<SeedPeer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Storage backend: "memory" or "rocksdb".
    pub db_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Authorised proposer pubkey hexes, in rotation order.
    pub validators: Vec<String>,
    #[serde(default = "default_max_block_txs")]
    pub max_block_txs: usize,
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
}

fn default_max_block_txs() -> usize {
    DEFAULT_MAX_BLOCK_TXS
}

fn default_block_interval_ms() -> u64 {
    DEFAULT_BLOCK_INTERVAL_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub enabled: bool,
    pub listen_addr: String,
    /// If set, requests require `Authorization: Bearer <token>`.
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            network: NetworkConfig {
                listen_addr: "0.0.0.0:30303".to_string(),
                seed_peers: Vec::new(),
            },
            storage: StorageConfig {
                data_dir: "./tessera-data".to_string(),
                db_type: "rocksdb".to_string(),
            },
            consensus: ConsensusConfig {
                validators: Vec::new(),
                max_block_txs: DEFAULT_MAX_BLOCK_TXS,
                block_interval_ms: DEFAULT_BLOCK_INTERVAL_MS,
            },
            rpc: RpcConfig {
                enabled: true,
                listen_addr: "127.0.0.1:8545".to_string(),
                auth_token: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            genesis: GenesisConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| NodeError::Config {
            reason: format!("failed to read config file '{}': {}", path, e),
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| NodeError::Config {
            reason: format!("failed to parse config file '{}': {}", path, e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file into the given directory.
    pub fn init(dir: &str) -> Result<(), NodeError> {
        let dir_path = Path::new(dir);
        if !dir_path.exists() {
            std::fs::create_dir_all(dir_path)?;
        }

        let config = NodeConfig::default();
        let toml_str = toml::to_string_pretty(&config).map_err(|e| NodeError::Config {
            reason: format!("failed to serialize default config: {}", e),
        })?;

        let config_path = dir_path.join("tessera.toml");
        std::fs::write(&config_path, toml_str)?;
        Ok(())
    }

    /// Check that all required fields are present and well-formed.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.node_id.is_empty() {
            return Err(NodeError::Config {
                reason: "node_id must not be empty".to_string(),
            });
        }
        if self.storage.data_dir.is_empty() {
            return Err(NodeError::Config {
                reason: "storage.data_dir must not be empty".to_string(),
            });
        }
        match self.storage.db_type.as_str() {
            "memory" | "rocksdb" => {}
            other => {
                return Err(NodeError::Config {
                    reason: format!(
                        "unknown storage backend '{}', expected 'memory' or 'rocksdb'",
                        other
                    ),
                })
            }
        }
        if self.genesis.chain_id.is_empty() {
            return Err(NodeError::Config {
                reason: "genesis.chain_id must not be empty".to_string(),
            });
        }
        if self.consensus.validators.is_empty() {
            return Err(NodeError::Config {
                reason: "consensus.validators must not be empty".to_string(),
            });
        }
        for (i, v) in self.consensus.validators.iter().enumerate() {
            let valid = v.len() == 64 && hex::decode(v).is_ok();
            if !valid {
                return Err(NodeError::Config {
                    reason: format!(
                        "consensus.validators[{}]: must be 64-char hex (32-byte ed25519 pubkey), got {:?}",
                        i, v
                    ),
                });
            }
        }
        if self.consensus.max_block_txs == 0 {
            return Err(NodeError::Config {
                reason: "consensus.max_block_txs must be > 0".to_string(),
            });
        }
        if self.consensus.block_interval_ms == 0 {
            return Err(NodeError::Config {
                reason: "consensus.block_interval_ms must be > 0".to_string(),
            });
        }
        if self.rpc.enabled && self.rpc.listen_addr == self.network.listen_addr {
            return Err(NodeError::Config {
                reason: format!(
                    "rpc.listen_addr and network.listen_addr must differ ({})",
                    self.rpc.listen_addr
                ),
            });
        }
        Ok(())
    }
}
