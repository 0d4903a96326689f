use thiserror::Error;

use tessera_chain::ChainError;

/// Errors from the peer-to-peer layer.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("codec error: {reason}")]
    Codec { reason: String },

    #[error("peer {id} closed")]
    PeerClosed { id: String },

    #[error("peer read timed out")]
    ReadTimeout,

    #[error(transparent)]
    Chain(#[from] ChainError),
}
