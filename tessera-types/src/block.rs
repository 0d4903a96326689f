use serde::{Deserialize, Serialize};

use tessera_crypto::hash::sha256_hex;
use tessera_crypto::keys::{self, Keypair};
use tessera_crypto::CryptoError;

use crate::primitives::{Hash, PubKey, Timestamp};
use crate::transaction::Transaction;

/// Block metadata that is hashed and signed. serde_json emits the fields in
/// declaration order, which is the canonical header encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub prev_hash: Hash,
    /// Hash of the full state after executing this block.
    pub state_root: Hash,
    /// Hash of all transaction ids in block order.
    pub tx_root: Hash,
    pub timestamp: Timestamp,
    /// Proposer's pubkey hex.
    pub proposer: PubKey,
    pub chain_id: String,
}

/// A collection of transactions with a signed header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub hash: Hash,
    pub signature: String,
}

impl Block {
    /// Create an unsigned block. `tx_root` is derived from the transaction
    /// ids; `state_root` is filled in by the producer after execution.
    pub fn new(
        chain_id: &str,
        height: u64,
        prev_hash: &str,
        proposer: &str,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            header: BlockHeader {
                height,
                prev_hash: prev_hash.to_string(),
                state_root: String::new(),
                tx_root: compute_tx_root(&transactions),
                timestamp,
                proposer: proposer.to_string(),
                chain_id: chain_id.to_string(),
            },
            transactions,
            hash: String::new(),
            signature: String::new(),
        }
    }

    /// SHA-256 of the canonical header encoding.
    pub fn compute_hash(&self) -> Hash {
        let data = serde_json::to_vec(&self.header).unwrap_or_default();
        sha256_hex(&data)
    }

    /// Set `hash` and sign the block with the proposer's key.
    pub fn sign(&mut self, keypair: &Keypair) {
        self.hash = self.compute_hash();
        self.signature = keypair.sign(self.hash.as_bytes());
    }

    /// Check that `hash` matches the recomputed header hash and that the
    /// signature verifies against `pubkey_hex`. Recomputing first prevents
    /// accepting blocks whose header was tampered with after signing.
    pub fn verify(&self, pubkey_hex: &str) -> Result<(), CryptoError> {
        let computed = self.compute_hash();
        if self.hash != computed {
            return Err(CryptoError::InvalidSignature);
        }
        keys::verify(pubkey_hex, self.hash.as_bytes(), &self.signature)
    }
}

/// Deterministic root hash over all transaction ids. Each id is
/// length-prefixed (4-byte big-endian) so that different id sets cannot
/// produce the same byte sequence.
pub fn compute_tx_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return sha256_hex(b"empty");
    }
    let mut buf = Vec::new();
    for tx in txs {
        let id = tx.id.as_bytes();
        buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
        buf.extend_from_slice(id);
    }
    sha256_hex(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TransferPayload, TxKind};

    fn signed_tx(kp: &Keypair, nonce: u64) -> Transaction {
        let payload = serde_json::to_value(TransferPayload {
            to: "bb".repeat(32),
            amount: 10,
        })
        .unwrap();
        let mut tx = Transaction::new(
            TxKind::Transfer,
            "tessera-test",
            &kp.public_key_hex(),
            nonce,
            0,
            1_000,
            payload,
        );
        tx.sign(kp);
        tx
    }

    #[test]
    fn test_empty_tx_root_is_hash_of_empty_marker() {
        assert_eq!(compute_tx_root(&[]), sha256_hex(b"empty"));
    }

    #[test]
    fn test_tx_root_depends_on_order() {
        let kp = Keypair::generate();
        let a = signed_tx(&kp, 0);
        let b = signed_tx(&kp, 1);
        let root_ab = compute_tx_root(&[a.clone(), b.clone()]);
        let root_ba = compute_tx_root(&[b, a]);
        assert_ne!(root_ab, root_ba);
    }

    #[test]
    fn test_block_sign_and_verify() {
        let kp = Keypair::generate();
        let mut block = Block::new("tessera-test", 1, &"0".repeat(64), &kp.public_key_hex(), 1, vec![]);
        block.sign(&kp);
        assert_eq!(block.hash, block.compute_hash());
        assert!(block.verify(&kp.public_key_hex()).is_ok());
    }

    #[test]
    fn test_tampered_header_rejected() {
        let kp = Keypair::generate();
        let mut block = Block::new("tessera-test", 1, &"0".repeat(64), &kp.public_key_hex(), 1, vec![]);
        block.sign(&kp);
        block.header.height = 2;
        assert!(block.verify(&kp.public_key_hex()).is_err());
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let mut block = Block::new("tessera-test", 1, &"0".repeat(64), &kp.public_key_hex(), 1, vec![]);
        block.sign(&kp);
        assert!(block.verify(&other.public_key_hex()).is_err());
    }

    #[test]
    fn test_header_hash_is_deterministic() {
        let kp = Keypair::generate();
        let block = Block::new("tessera-test", 7, &"0".repeat(64), &kp.public_key_hex(), 42, vec![]);
        assert_eq!(block.compute_hash(), block.compute_hash());
    }
}
