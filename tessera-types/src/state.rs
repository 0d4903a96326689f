use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::primitives::{Amount, Hash, PubKey, Timestamp};

/// A participant's token balance and replay-protection nonce.
/// Accounts that have never been written read as the zero-value account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: PubKey,
    #[serde(default)]
    pub balance: Amount,
    #[serde(default)]
    pub nonce: u64,
}

impl Account {
    /// The zero-value account for an address that has never been written.
    pub fn zero(address: &str) -> Self {
        Self {
            address: address.to_string(),
            balance: 0,
            nonce: 0,
        }
    }
}

/// A universal game asset: item, card, character, etc.
/// `properties` is an open map so each game genre can store arbitrary fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Hash,
    pub template_id: String,
    pub owner: PubKey,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    pub tradeable: bool,
    pub minted_at: Timestamp,
    /// Non-empty while the asset has an active market listing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub active_listing_id: String,
}

/// Defines the schema and rules for a class of assets. Immutable once
/// registered; re-registering the same id fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub schema: BTreeMap<String, Value>,
    pub tradeable: bool,
    pub creator: PubKey,
}

/// Lifecycle states of a game session.
pub const SESSION_OPEN: &str = "open";
pub const SESSION_CLOSED: &str = "closed";

/// An active or completed game match with staked entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub game_id: String,
    /// Pubkey of the session opener.
    pub creator: PubKey,
    pub players: Vec<PubKey>,
    /// Tokens locked per player at open.
    pub stakes: Amount,
    /// "open" | "closed"; a session transitions exactly once.
    pub status: String,
    /// Pubkey hex -> reward, set at close.
    #[serde(default)]
    pub outcome: BTreeMap<PubKey, Amount>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub closed_at: Timestamp,
}

/// A peer-to-peer asset sale offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: Hash,
    pub asset_id: Hash,
    pub seller: PubKey,
    pub price: Amount,
    pub active: bool,
    pub created_at: Timestamp,
}
