//! AES-256-GCM sealing.
//!
//! Wire format:
//!
//! ```text
//! [1 byte: format version][12 bytes: nonce][N bytes: ciphertext + 16 byte tag]
//! ```
//!
//! The version byte is also bound as associated data, so every byte of the
//! output is authenticated.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const FORMAT_VERSION: u8 = 1;

/// A 256-bit symmetric key. Zeroed on drop, redacted in debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Generate a fresh random key from the OS entropy source.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        fill_random(&mut bytes)?;
        let key = Self(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, failing if it is not exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::Encryption(format!(
                "invalid key length: expected {KEY_LEN}, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Fill `buf` from the OS entropy source.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::RandomSource(e.to_string()))
}

/// Seal `plaintext` under `key` with a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    let aad = [FORMAT_VERSION];
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Seal under raw key bytes, failing with [`CryptoError::Encryption`] on a
/// key-size mismatch.
pub fn seal_with_key_bytes(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let key = SymmetricKey::from_slice(key)?;
    seal(plaintext, &key)
}

/// Open a sealed payload.
///
/// Any failure, whether truncation, a wrong key or a flipped bit, is reported
/// as [`CryptoError::Authentication`].
pub fn open(sealed: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if sealed.len() < 1 + NONCE_LEN + TAG_LEN || sealed[0] != FORMAT_VERSION {
        return Err(CryptoError::Authentication);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Authentication)?;
    let (nonce, ciphertext) = sealed[1..].split_at(NONCE_LEN);

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &sealed[..1],
            },
        )
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SymmetricKey::generate().unwrap();
        let sealed = seal(b"hello, sealed world", &key).unwrap();
        assert_eq!(open(&sealed, &key).unwrap(), b"hello, sealed world");
    }

    #[test]
    fn test_sealed_layout() {
        let key = SymmetricKey::generate().unwrap();
        let sealed = seal(b"abc", &key).unwrap();
        assert_eq!(sealed.len(), 1 + NONCE_LEN + 3 + TAG_LEN);
        assert_eq!(sealed[0], FORMAT_VERSION);
    }

    #[test]
    fn test_nonce_is_fresh() {
        let key = SymmetricKey::generate().unwrap();
        let a = seal(b"same", &key).unwrap();
        let b = seal(b"same", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_authentication_error() {
        let key = SymmetricKey::generate().unwrap();
        let other = SymmetricKey::generate().unwrap();
        let sealed = seal(b"secret", &key).unwrap();
        assert_eq!(open(&sealed, &other), Err(CryptoError::Authentication));
    }

    #[test]
    fn test_every_flipped_byte_is_detected() {
        let key = SymmetricKey::generate().unwrap();
        let sealed = seal(b"tamper target", &key).unwrap();

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                open(&tampered, &key),
                Err(CryptoError::Authentication),
                "byte {i} flip went undetected"
            );
        }
    }

    #[test]
    fn test_truncated_input_is_authentication_error() {
        let key = SymmetricKey::generate().unwrap();
        assert_eq!(open(&[], &key), Err(CryptoError::Authentication));
        assert_eq!(open(&[1; 20], &key), Err(CryptoError::Authentication));
    }

    #[test]
    fn test_key_size_mismatch_is_encryption_error() {
        assert!(matches!(
            seal_with_key_bytes(b"x", &[0u8; 16]),
            Err(CryptoError::Encryption(_))
        ));
        assert!(seal_with_key_bytes(b"x", &[0u8; KEY_LEN]).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0x42; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "SymmetricKey(..)");
    }

    proptest! {
        #[test]
        fn test_any_flipped_byte_is_rejected(
            key in any::<[u8; KEY_LEN]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..256),
            position in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let key = SymmetricKey::from_bytes(key);
            let mut sealed = seal(&plaintext, &key).unwrap();
            prop_assert_eq!(open(&sealed, &key).unwrap(), plaintext);

            let i = position.index(sealed.len());
            sealed[i] ^= flip;
            prop_assert_eq!(open(&sealed, &key), Err(CryptoError::Authentication));
        }
    }
}
