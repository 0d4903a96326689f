use thiserror::Error;

/// Errors that can occur in the node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {reason}")]
    Config { reason: String },

    #[error("genesis error: {reason}")]
    Genesis { reason: String },

    #[error("key error: {reason}")]
    Key { reason: String },

    #[error(transparent)]
    Storage(#[from] tessera_storage::StorageError),

    #[error(transparent)]
    Chain(#[from] tessera_chain::ChainError),

    #[error(transparent)]
    Net(#[from] tessera_net::NetError),

    #[error("rpc error: {reason}")]
    Rpc { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
