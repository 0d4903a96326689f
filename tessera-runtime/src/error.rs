use thiserror::Error;

use tessera_crypto::CryptoError;
use tessera_storage::StorageError;

/// Errors from transaction execution. Every variant except `Storage` is a
/// precondition failure that aborts the transaction and triggers a snapshot
/// revert; `Storage` wraps backing-store failures.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("signature: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("tx {id} failed: {source}")]
    TxFailed {
        id: String,
        #[source]
        source: Box<ExecError>,
    },

    #[error("decode {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    #[error("invalid nonce: expected {expected} got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("nonce overflow for account {0}")]
    NonceOverflow(String),

    #[error("balance overflow for account {0}")]
    BalanceOverflow(String),

    #[error("insufficient balance: have {have} need {need}")]
    InsufficientBalance { have: u64, need: u64 },

    #[error("transfer amount must be > 0")]
    ZeroAmount,

    #[error("recipient address required")]
    MissingRecipient,

    #[error("template id required")]
    MissingTemplateId,

    #[error("template {0:?} already exists")]
    TemplateExists(String),

    #[error("template {0:?} not found")]
    TemplateNotFound(String),

    #[error("asset {0:?} not found")]
    AssetNotFound(String),

    #[error("only the asset owner can {action} it")]
    NotAssetOwner { action: &'static str },

    #[error("asset {0:?} is not tradeable")]
    NotTradeable(String),

    #[error("asset {asset_id:?} has an active listing; cancel it before {action}")]
    AssetListed {
        asset_id: String,
        action: &'static str,
    },

    #[error("price must be > 0")]
    ZeroPrice,

    #[error("listing {0:?} not found")]
    ListingNotFound(String),

    #[error("listing {0:?} is no longer active")]
    ListingInactive(String),

    #[error("seller cannot buy their own listing")]
    OwnListing,

    #[error("session id required")]
    MissingSessionId,

    #[error("at least one player required")]
    NoPlayers,

    #[error("session {0:?} already exists")]
    SessionExists(String),

    #[error("session {0:?} not found")]
    SessionNotFound(String),

    #[error("session {0:?} already closed")]
    SessionClosed(String),

    #[error("player {player:?} insufficient balance for stakes: have {have} need {need}")]
    InsufficientStakes {
        player: String,
        have: u64,
        need: u64,
    },

    #[error("rewards exceed total stakes {total}")]
    RewardsExceedStakes { total: u64 },
}
