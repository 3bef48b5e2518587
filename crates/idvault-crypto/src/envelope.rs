//! Per-artifact hybrid encryption.
//!
//! [`CipherEnvelope::seal`] generates a fresh content key and a fresh key
//! pair, seals the content, wraps the content key under the new public key
//! and drops the content key. Only the wrapped form survives.

use serde::{Deserialize, Serialize};

use crate::asymmetric::{generate_key_pair, PrivateKey, PublicKey};
use crate::error::Result;
use crate::symmetric::{open, seal, SymmetricKey};
use crate::wrap::{unwrap_key, wrap_key, WrappedKey};

/// Public metadata needed to open a sealed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub public_key: PublicKey,
    pub wrapped_key: WrappedKey,
}

/// Output of sealing one artifact.
#[derive(Debug)]
pub struct SealedArtifact {
    pub ciphertext: Vec<u8>,
    pub header: EnvelopeHeader,
    /// The only key able to unwrap the content key. The caller decides how
    /// to hold it; it is never persisted by this module.
    pub private_key: PrivateKey,
}

/// Hybrid envelope operations.
pub struct CipherEnvelope;

impl CipherEnvelope {
    /// Seal `plaintext` under a fresh content key and key pair.
    pub fn seal(plaintext: &[u8]) -> Result<SealedArtifact> {
        let content_key = SymmetricKey::generate()?;
        let (public_key, private_key) = generate_key_pair()?;

        let ciphertext = seal(plaintext, &content_key)?;
        let wrapped_key = wrap_key(&content_key, &public_key)?;

        Ok(SealedArtifact {
            ciphertext,
            header: EnvelopeHeader {
                public_key,
                wrapped_key,
            },
            private_key,
        })
    }

    /// Open a sealed artifact, obtaining the content key through `unwrap`.
    ///
    /// `unwrap` is the caller's private-key access path: it receives the
    /// wrapped key and returns the content key or an error that is passed
    /// through unchanged.
    pub fn open<F>(ciphertext: &[u8], header: &EnvelopeHeader, unwrap: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&WrappedKey) -> Result<SymmetricKey>,
    {
        let content_key = unwrap(&header.wrapped_key)?;
        open(ciphertext, &content_key)
    }

    /// Open with the private key directly.
    pub fn open_with_private_key(
        ciphertext: &[u8],
        header: &EnvelopeHeader,
        private_key: &PrivateKey,
    ) -> Result<Vec<u8>> {
        Self::open(ciphertext, header, |wrapped| unwrap_key(wrapped, private_key))
    }
}
