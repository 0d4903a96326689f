use thiserror::Error;

use tessera_crypto::CryptoError;
use tessera_runtime::ExecError;
use tessera_storage::StorageError;

/// Errors from chain management, the mempool, and consensus.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Execution(#[from] ExecError),

    #[error("invalid tx signature: {0}")]
    Crypto(#[from] CryptoError),

    // ---- mempool ----
    #[error("mempool full")]
    MempoolFull,

    #[error("tx {0} already in pool")]
    DuplicateTransaction(String),

    #[error("transaction expired")]
    TransactionExpired,

    #[error("transaction timestamp too far in the future")]
    TransactionFromFuture,

    // ---- chain linkage ----
    #[error("block height {got} does not follow tip {tip}")]
    HeightMismatch { got: u64, tip: u64 },

    #[error("prev_hash mismatch: got {got} want {want}")]
    PrevHashMismatch { got: String, want: String },

    #[error("first block must reference the genesis prev-hash")]
    InvalidGenesisLink,

    // ---- consensus ----
    #[error("no validators configured")]
    NoValidators,

    #[error("not the proposer for this round")]
    NotProposer,

    #[error("chain id mismatch: got {got:?} want {want:?}")]
    ChainIdMismatch { got: String, want: String },

    #[error("wrong proposer: got {got} want {want}")]
    WrongProposer { got: String, want: String },

    #[error("tx_root mismatch: got {got} want {want}")]
    TxRootMismatch { got: String, want: String },

    #[error("block timestamp too far in future: {timestamp} (now {now})")]
    BlockTimestampFuture { timestamp: i64, now: i64 },

    #[error("block timestamp {timestamp} < previous block {previous}")]
    BlockTimestampBeforeTip { timestamp: i64, previous: i64 },

    #[error("state_root mismatch: got {got} want {want}")]
    StateRootMismatch { got: String, want: String },
}
