use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tessera_crypto::hash::sha256_hex;
use tessera_crypto::keys::{self, Keypair};
use tessera_crypto::CryptoError;

use crate::primitives::{Amount, Hash, PubKey, Timestamp};

/// The closed set of operations a transaction can perform. Serialized with
/// the snake_case wire names; an unknown name fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Transfer,
    RegisterTemplate,
    MintAsset,
    BurnAsset,
    TransferAsset,
    ListMarket,
    BuyMarket,
    SessionOpen,
    SessionResult,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Transfer => "transfer",
            TxKind::RegisterTemplate => "register_template",
            TxKind::MintAsset => "mint_asset",
            TxKind::BurnAsset => "burn_asset",
            TxKind::TransferAsset => "transfer_asset",
            TxKind::ListMarket => "list_market",
            TxKind::BuyMarket => "buy_market",
            TxKind::SessionOpen => "session_open",
            TxKind::SessionResult => "session_result",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The atomic unit of work on the chain. `from` holds the sender's full
/// hex-encoded Ed25519 public key; `signature` covers every field except
/// `id` and `signature` themselves, and `id` is the hash of that signing body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub chain_id: String,
    pub from: PubKey,
    pub nonce: u64,
    pub fee: Amount,
    pub timestamp: Timestamp,
    pub payload: Value,
    pub signature: String,
}

/// The fields covered by the signature, in the canonical order. serde_json
/// emits struct fields in declaration order and sorts Value map keys, so the
/// encoding is byte-identical across replicas.
#[derive(Serialize)]
struct SigningBody<'a> {
    #[serde(rename = "type")]
    kind: TxKind,
    chain_id: &'a str,
    from: &'a str,
    nonce: u64,
    fee: Amount,
    timestamp: Timestamp,
    payload: &'a Value,
}

impl Transaction {
    /// Create an unsigned transaction with the given payload.
    pub fn new(
        kind: TxKind,
        chain_id: &str,
        from: &str,
        nonce: u64,
        fee: Amount,
        timestamp: Timestamp,
        payload: Value,
    ) -> Self {
        Self {
            id: String::new(),
            kind,
            chain_id: chain_id.to_string(),
            from: from.to_string(),
            nonce,
            fee,
            timestamp,
            payload,
            signature: String::new(),
        }
    }

    /// Deterministic hash of the transaction sans `id` and `signature`.
    pub fn signing_hash(&self) -> Hash {
        let body = SigningBody {
            kind: self.kind,
            chain_id: &self.chain_id,
            from: &self.from,
            nonce: self.nonce,
            fee: self.fee,
            timestamp: self.timestamp,
            payload: &self.payload,
        };
        // Serializing a known struct over Value cannot fail.
        let data = serde_json::to_vec(&body).unwrap_or_default();
        sha256_hex(&data)
    }

    /// Compute the signature and set `id`.
    pub fn sign(&mut self, keypair: &Keypair) {
        let hash = self.signing_hash();
        self.signature = keypair.sign(hash.as_bytes());
        self.id = hash;
    }

    /// Check that `from` is a valid public key and the signature verifies
    /// over the recomputed signing hash.
    pub fn verify(&self) -> Result<(), CryptoError> {
        if self.from.is_empty() {
            return Err(CryptoError::InvalidPubKey {
                reason: "missing from field".to_string(),
            });
        }
        keys::verify(&self.from, self.signing_hash().as_bytes(), &self.signature)
    }
}

// ---- Payload types ----

/// Transfers native tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferPayload {
    pub to: PubKey,
    pub amount: Amount,
}

/// Mints a new asset from a registered template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintAssetPayload {
    pub template_id: String,
    /// Recipient pubkey hex; defaults to the sender when empty.
    #[serde(default)]
    pub owner: PubKey,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Permanently destroys an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BurnAssetPayload {
    pub asset_id: Hash,
}

/// Moves an asset to a new owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferAssetPayload {
    pub asset_id: Hash,
    pub to: PubKey,
}

/// Defines a new class of game assets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterTemplatePayload {
    pub id: String,
    pub name: String,
    /// Allowed property keys -> type hints.
    #[serde(default)]
    pub schema: BTreeMap<String, Value>,
    pub tradeable: bool,
}

/// Opens a new game session and locks stakes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOpenPayload {
    pub session_id: String,
    #[serde(default)]
    pub game_id: String,
    pub players: Vec<PubKey>,
    /// Tokens locked per player.
    #[serde(default)]
    pub stakes: Amount,
}

/// Closes a session and distributes rewards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionResultPayload {
    pub session_id: String,
    /// Pubkey hex -> reward.
    #[serde(default)]
    pub outcome: BTreeMap<PubKey, Amount>,
}

/// Lists an asset for sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMarketPayload {
    pub asset_id: Hash,
    pub price: Amount,
}

/// Purchases an active market listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyMarketPayload {
    pub listing_id: Hash,
}
