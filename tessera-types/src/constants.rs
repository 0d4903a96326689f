use std::time::Duration;

/// Canonical all-zeros previous hash for the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// True if `h` is the canonical 64-zero genesis prev-hash.
pub fn is_genesis_hash(h: &str) -> bool {
    h.len() == 64 && h.bytes().all(|b| b == b'0')
}

/// Maximum size of a single peer message (length prefix bound).
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

/// Maximum number of pending transactions held by the mempool.
pub const MAX_MEMPOOL_SIZE: usize = 10_000;

/// Reject mempool transactions older than this (nanoseconds).
pub const MAX_TX_AGE_NS: i64 = 3_600_000_000_000;

/// Reject mempool transactions more than this far in the future (nanoseconds).
pub const MAX_TX_FUTURE_NS: i64 = 300_000_000_000;

/// Maximum allowed clock drift for incoming block timestamps (nanoseconds).
pub const MAX_BLOCK_TIME_DRIFT_NS: i64 = 15_000_000_000;

/// Default cap on transactions pulled into a produced block.
pub const DEFAULT_MAX_BLOCK_TXS: usize = 500;

/// Default block production interval in milliseconds.
pub const DEFAULT_BLOCK_INTERVAL_MS: u64 = 2_000;

/// Number of blocks requested per sync round.
pub const SYNC_BATCH_LIMIT: u32 = 50;

/// Upper bound a peer may request in a single `get_blocks`.
pub const MAX_SYNC_BATCH_LIMIT: u32 = 200;

/// Default limit on simultaneous peer connections.
pub const DEFAULT_MAX_PEERS: usize = 50;

/// Read deadline on peer sockets; a stalled peer cannot block a read task
/// beyond this.
pub const PEER_READ_TIMEOUT: Duration = Duration::from_secs(30);
