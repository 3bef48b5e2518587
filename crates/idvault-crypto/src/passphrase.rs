//! Passphrase-derived account keys (Argon2id).
//!
//! The salt is random per account and stored in the clear next to the sealed
//! record, so the passphrase alone is enough to re-derive the key.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::symmetric::{fill_random, SymmetricKey, KEY_LEN};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Minimal costs for tests. Never use for real accounts.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Per-account KDF salt, hex-encoded when serialized.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KdfSalt([u8; SALT_LEN]);

impl KdfSalt {
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; SALT_LEN];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl fmt::Debug for KdfSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KdfSalt({})", hex::encode(self.0))
    }
}

impl From<KdfSalt> for String {
    fn from(s: KdfSalt) -> String {
        hex::encode(s.0)
    }
}

impl TryFrom<String> for KdfSalt {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let bytes = hex::decode(&s).map_err(|e| e.to_string())?;
        let arr: [u8; SALT_LEN] = bytes
            .try_into()
            .map_err(|_| format!("salt must be {SALT_LEN} bytes"))?;
        Ok(Self(arr))
    }
}

/// The key an account record is sealed under.
#[derive(Clone)]
pub struct AccountKey(SymmetricKey);

impl AccountKey {
    /// Derive from a passphrase with Argon2id.
    pub fn derive(passphrase: &str, salt: &KdfSalt, params: &KdfParams) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(CryptoError::KeyDerivation("passphrase is empty".into()));
        }

        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        argon
            .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), out.as_mut_slice())
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self(SymmetricKey::from_bytes(*out)))
    }

    /// Wrap an existing symmetric key.
    pub fn from_symmetric(key: SymmetricKey) -> Self {
        Self(key)
    }

    pub fn as_symmetric(&self) -> &SymmetricKey {
        &self.0
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = KdfSalt::from_bytes([9; SALT_LEN]);
        let params = KdfParams::insecure_fast();
        let a = AccountKey::derive("correct horse", &salt, &params).unwrap();
        let b = AccountKey::derive("correct horse", &salt, &params).unwrap();
        assert_eq!(a.as_symmetric().as_bytes(), b.as_symmetric().as_bytes());
    }

    #[test]
    fn test_salt_and_passphrase_matter() {
        let params = KdfParams::insecure_fast();
        let s1 = KdfSalt::from_bytes([1; SALT_LEN]);
        let s2 = KdfSalt::from_bytes([2; SALT_LEN]);

        let base = AccountKey::derive("pw", &s1, &params).unwrap();
        let other_salt = AccountKey::derive("pw", &s2, &params).unwrap();
        let other_pw = AccountKey::derive("pw2", &s1, &params).unwrap();

        assert_ne!(
            base.as_symmetric().as_bytes(),
            other_salt.as_symmetric().as_bytes()
        );
        assert_ne!(
            base.as_symmetric().as_bytes(),
            other_pw.as_symmetric().as_bytes()
        );
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let salt = KdfSalt::generate().unwrap();
        assert!(matches!(
            AccountKey::derive("", &salt, &KdfParams::insecure_fast()),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_salt_hex_serde() {
        let salt = KdfSalt::from_bytes([0xab; SALT_LEN]);
        let json = serde_json::to_string(&salt).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(SALT_LEN)));
        assert_eq!(serde_json::from_str::<KdfSalt>(&json).unwrap(), salt);
        assert!(serde_json::from_str::<KdfSalt>("\"abab\"").is_err());
    }
}
