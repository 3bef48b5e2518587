//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
///
/// `Authentication`, `Unwrap` and `Decryption` deliberately carry no detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The operating system entropy source failed.
    #[error("random source failure: {0}")]
    RandomSource(String),

    /// Sealing failed (e.g. wrong key size).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Ciphertext was tampered with or the key is wrong.
    #[error("authentication failed")]
    Authentication,

    /// Key pair generation failed.
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    /// Wrapping a symmetric key failed.
    #[error("key wrap error: {0}")]
    Wrap(String),

    /// The wrapped key could not be recovered with the given private key.
    #[error("key unwrap failed")]
    Unwrap,

    /// Passphrase key derivation failed.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// An encrypted record could not be opened with the given key.
    #[error("record decryption failed")]
    Decryption,

    /// A record decrypted but its structure is invalid.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
