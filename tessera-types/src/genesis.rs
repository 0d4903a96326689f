use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::primitives::{Amount, PubKey, Timestamp};

/// The chain's initial state: identity, funded accounts, and the fixed
/// genesis timestamp. The timestamp is part of the config (not wall-clock)
/// so that every node derives the identical genesis block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub chain_id: String,
    /// Pubkey hex -> initial balance.
    #[serde(default)]
    pub alloc: BTreeMap<PubKey, Amount>,
    #[serde(default)]
    pub timestamp: Timestamp,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            chain_id: "tessera-dev".to_string(),
            alloc: BTreeMap::new(),
            timestamp: 0,
        }
    }
}
