use thiserror::Error;

/// Errors from key handling and signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid public key hex: {reason}")]
    InvalidPubKey { reason: String },

    #[error("invalid private key hex: {reason}")]
    InvalidPrivKey { reason: String },

    #[error("invalid signature encoding: {reason}")]
    InvalidSignatureEncoding { reason: String },

    #[error("signature verification failed")]
    InvalidSignature,
}
