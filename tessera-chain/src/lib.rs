pub mod authority;
pub mod blockchain;
pub mod error;
pub mod mempool;

pub use authority::Authority;
pub use blockchain::Blockchain;
pub use error::ChainError;
pub use mempool::Mempool;

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}
