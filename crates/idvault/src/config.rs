//! Vault configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use idvault_crypto::KdfParams;

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Upper bound on any single Ledger or KeyStore call.
    pub ledger_timeout: Duration,

    /// Upper bound on any single BlobStore call.
    pub blob_timeout: Duration,

    /// Argon2id cost for passphrase-derived account keys.
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            ledger_timeout: Duration::from_secs(10),
            blob_timeout: Duration::from_secs(30),
            kdf: KdfParams::default(),
        }
    }
}

impl VaultConfig {
    pub fn with_ledger_timeout(mut self, timeout: Duration) -> Self {
        self.ledger_timeout = timeout;
        self
    }

    pub fn with_blob_timeout(mut self, timeout: Duration) -> Self {
        self.blob_timeout = timeout;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}
