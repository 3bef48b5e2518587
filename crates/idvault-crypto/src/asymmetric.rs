//! X25519 key pairs for per-version key wrapping.
//!
//! Each document version gets its own pair. The public half travels with the
//! version metadata; the private half is handed back to the caller and never
//! stored unsealed.

use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, Result};
use crate::symmetric::{fill_random, SymmetricKey};

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::Serialization(format!(
                "invalid public key length: expected 32, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }
}

/// An X25519 private key. Zeroed on drop.
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    /// Create from secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Export the secret bytes, zeroed when the returned buffer drops.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Derive the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*DalekPublicKey::from(&self.0).as_bytes())
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer: &PublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(public={})", hex::encode(&self.public_key().0[..8]))
    }
}

/// Generate a fresh X25519 key pair.
pub fn generate_key_pair() -> Result<(PublicKey, PrivateKey)> {
    let mut seed = Zeroizing::new([0u8; 32]);
    fill_random(&mut seed[..]).map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let private = PrivateKey::from_bytes(*seed);
    Ok((private.public_key(), private))
}

/// A shared secret from X25519 key agreement.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a wrapping key from this secret, bound to `context`.
    pub fn derive_wrap_key(&self, context: &[u8]) -> SymmetricKey {
        let mut hasher = blake3::Hasher::new_derive_key("idvault-key-wrap-v1");
        hasher.update(&self.0);
        hasher.update(context);
        SymmetricKey::from_bytes(*hasher.finalize().as_bytes())
    }
}
