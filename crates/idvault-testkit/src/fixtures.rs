//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use idvault::{AccountCredentials, KdfParams, Result, Vault, VaultConfig};
use idvault_core::{AccountProfile, DocumentVersion};
use idvault_store::{MemoryBlobStore, MemoryKeyStore, MemoryLedger};

/// Passphrase used for every fixture account.
pub const PASSPHRASE: &str = "fixture passphrase";

/// A vault over in-memory collaborators.
pub type MemoryVault = Vault<MemoryLedger, MemoryBlobStore, MemoryKeyStore>;

/// A test fixture holding one in-memory vault.
pub struct TestFixture {
    pub vault: MemoryVault,
}

impl TestFixture {
    /// Create a fixture with [`fast_config`].
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: VaultConfig) -> Self {
        Self {
            vault: Vault::open(
                MemoryLedger::new(),
                MemoryBlobStore::new(),
                MemoryKeyStore::new(),
                config,
            ),
        }
    }

    /// Register an account under [`PASSPHRASE`].
    pub async fn account(&self, profile: &AccountProfile) -> Result<AccountCredentials> {
        self.vault.create_account(profile, PASSPHRASE).await
    }

    /// Register an account built by [`profile`].
    pub async fn person(&self, first_name: &str) -> Result<AccountCredentials> {
        self.account(&profile(first_name)).await
    }

    /// Create a document issued in NL to the owner's first name.
    pub async fn document(
        &self,
        owner: &AccountCredentials,
        name: &str,
        content: &[u8],
    ) -> Result<DocumentVersion> {
        let account = self.vault.get_account(&owner.public_id, &owner.key).await?;
        self.vault
            .create_document(
                &owner.public_id,
                &owner.key,
                name,
                &account.account_data.first_name,
                "NL",
                content,
            )
            .await
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Default timeouts with a KDF cheap enough for tests.
pub fn fast_config() -> VaultConfig {
    VaultConfig::default().with_kdf(KdfParams::insecure_fast())
}

/// A valid profile derived from a first name.
pub fn profile(first_name: &str) -> AccountProfile {
    AccountProfile::new(
        first_name,
        "tester",
        format!("{}@example.org", first_name.to_lowercase()),
        "",
    )
}

/// Distinct profiles for multi-party tests.
pub fn sample_profiles(count: usize) -> Vec<AccountProfile> {
    (0..count).map(|i| profile(&format!("person{i}"))).collect()
}
