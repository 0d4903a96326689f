use ed25519_dalek::{Signer, Verifier};

use crate::error::CryptoError;

/// Wrapper around an Ed25519 keypair. All public identities on the chain are
/// the full 64-char lower-case hex encoding of the 32-byte public key.
pub struct Keypair {
    inner: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        Self { inner: signing_key }
    }

    /// Create a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self { inner: signing_key }
    }

    /// Create a keypair from a 64-char hex seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(seed_hex).map_err(|e| CryptoError::InvalidPrivKey {
            reason: e.to_string(),
        })?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPrivKey {
            reason: "seed must be 32 bytes".to_string(),
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Get the public key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.inner.verifying_key().to_bytes()
    }

    /// Get the public key as lower-case hex (the on-chain identity).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Get the 32-byte seed (secret key bytes) of this keypair.
    pub fn seed(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Sign a message, returning the signature as lower-case hex.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.inner.sign(message).to_bytes())
    }
}

// SigningKey with the "zeroize" feature implements ZeroizeOnDrop, so key
// material is wiped when Keypair is dropped.

/// Decode and validate a hex-encoded Ed25519 public key.
pub fn pubkey_from_hex(s: &str) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
    let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidPubKey {
        reason: e.to_string(),
    })?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidPubKey {
        reason: "public key must be 32 bytes".to_string(),
    })?;
    ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidPubKey {
        reason: "not a valid ed25519 point".to_string(),
    })
}

/// Verify a hex-encoded Ed25519 signature over `message` against a hex public key.
pub fn verify(pubkey_hex: &str, message: &[u8], signature_hex: &str) -> Result<(), CryptoError> {
    let verifying_key = pubkey_from_hex(pubkey_hex)?;
    let sig_bytes =
        hex::decode(signature_hex).map_err(|e| CryptoError::InvalidSignatureEncoding {
            reason: e.to_string(),
        })?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignatureEncoding {
            reason: "signature must be 64 bytes".to_string(),
        })?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_arr);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}
