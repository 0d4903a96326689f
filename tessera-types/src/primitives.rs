/// Lower-case hex SHA-256 digest (64 chars). Used for transaction ids, block
/// hashes, asset ids, and listing ids.
pub type Hash = String;

/// Lower-case hex Ed25519 public key (64 chars). The only account identity on
/// the chain.
pub type PubKey = String;

/// Unix timestamp in nanoseconds.
pub type Timestamp = i64;

/// Token amount in base units.
pub type Amount = u64;
