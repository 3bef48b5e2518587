//! Wrapping a symmetric key under an X25519 public key.
//!
//! An ephemeral key pair performs ECDH with the recipient public key. The
//! shared secret is run through a Blake3 KDF bound to both public keys, and
//! the result encrypts the symmetric key with ChaCha20-Poly1305.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::asymmetric::{generate_key_pair, PrivateKey, PublicKey};
use crate::error::{CryptoError, Result};
use crate::symmetric::{fill_random, SymmetricKey, KEY_LEN, NONCE_LEN};

/// A symmetric key encrypted for one X25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: PublicKey,

    /// Nonce used for encryption.
    pub nonce: [u8; NONCE_LEN],

    /// The symmetric key, encrypted with the derived wrapping key.
    pub encrypted_key: Vec<u8>,
}

impl WrappedKey {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    ///
    /// Malformed bytes are an unwrap failure: they cannot yield the key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|_| CryptoError::Unwrap)
    }
}

fn wrap_context(ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; 64] {
    let mut context = [0u8; 64];
    context[..32].copy_from_slice(ephemeral.as_bytes());
    context[32..].copy_from_slice(recipient.as_bytes());
    context
}

/// Wrap `key` so only the holder of `recipient`'s private key can unwrap it.
pub fn wrap_key(key: &SymmetricKey, recipient: &PublicKey) -> Result<WrappedKey> {
    let (ephemeral_public, ephemeral) =
        generate_key_pair().map_err(|e| CryptoError::Wrap(e.to_string()))?;

    let shared = ephemeral.diffie_hellman(recipient);
    let wrap_key = shared.derive_wrap_key(&wrap_context(&ephemeral_public, recipient));

    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce).map_err(|e| CryptoError::Wrap(e.to_string()))?;

    let cipher = ChaCha20Poly1305::new_from_slice(wrap_key.as_bytes())
        .map_err(|e| CryptoError::Wrap(e.to_string()))?;
    let encrypted_key = cipher
        .encrypt(Nonce::from_slice(&nonce), key.as_bytes().as_slice())
        .map_err(|e| CryptoError::Wrap(e.to_string()))?;

    Ok(WrappedKey {
        ephemeral_public,
        nonce,
        encrypted_key,
    })
}

/// Recover the symmetric key with the recipient's private key.
///
/// Every failure is [`CryptoError::Unwrap`].
pub fn unwrap_key(wrapped: &WrappedKey, private: &PrivateKey) -> Result<SymmetricKey> {
    let recipient = private.public_key();
    let shared = private.diffie_hellman(&wrapped.ephemeral_public);
    let wrap_key = shared.derive_wrap_key(&wrap_context(&wrapped.ephemeral_public, &recipient));

    let cipher =
        ChaCha20Poly1305::new_from_slice(wrap_key.as_bytes()).map_err(|_| CryptoError::Unwrap)?;
    let key_bytes = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&wrapped.nonce),
                wrapped.encrypted_key.as_slice(),
            )
            .map_err(|_| CryptoError::Unwrap)?,
    );

    if key_bytes.len() != KEY_LEN {
        return Err(CryptoError::Unwrap);
    }
    SymmetricKey::from_slice(&key_bytes).map_err(|_| CryptoError::Unwrap)
}
