use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` as a lower-case hex string (64 chars).
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the raw SHA-256 bytes of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}
