//! Shared fixtures for integration tests: memory collaborators with
//! switchable faults.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use idvault::core::{AccountProfile, ContentId, KeyRef};
use idvault::store::{
    BlobStore, HistoryEntry, KeyStore, Ledger, MemoryBlobStore, MemoryKeyStore, MemoryLedger,
    Result, Selector, StoreError, TxId,
};
use idvault::{AccountCredentials, KdfParams, Vault, VaultConfig};

pub type TestVault = Vault<FlakyLedger, FlakyBlobs, FlakyKeys>;

/// How long a stalled call sleeps; far beyond any test timeout.
const STALL: Duration = Duration::from_secs(3600);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn config() -> VaultConfig {
    VaultConfig::default().with_kdf(KdfParams::insecure_fast())
}

pub fn vault() -> TestVault {
    vault_with(config())
}

pub fn vault_with(config: VaultConfig) -> TestVault {
    init_tracing();
    Vault::open(
        FlakyLedger::default(),
        FlakyBlobs::default(),
        FlakyKeys::default(),
        config,
    )
}

pub fn anna() -> AccountProfile {
    AccountProfile::new("anna", "angelova", "anna@x.io", "555")
}

pub fn bank() -> AccountProfile {
    AccountProfile::new("kyc", "desk", "kyc@bank.io", "")
}

pub async fn account(vault: &TestVault, profile: &AccountProfile) -> AccountCredentials {
    vault.create_account(profile, "passphrase").await.unwrap()
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {what} failure"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// When a stalled ledger write stalls relative to applying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutStall {
    #[default]
    Never,
    /// Stall before the write is applied; it never lands.
    BeforeApply,
    /// Apply the write, then stall the reply.
    AfterApply,
    /// Apply the write, then stall it and every later call.
    AfterApplyWedged,
}

/// A [`MemoryLedger`] whose writes can fail and whose calls can stall.
#[derive(Default)]
pub struct FlakyLedger {
    pub inner: MemoryLedger,
    fail_puts: AtomicBool,
    stall: AtomicBool,
    put_stall: Mutex<PutStall>,
}

impl FlakyLedger {
    pub fn fail_puts(&self, on: bool) {
        self.fail_puts.store(on, Ordering::SeqCst);
    }

    /// Stall every call.
    pub fn stall(&self, on: bool) {
        self.stall.store(on, Ordering::SeqCst);
    }

    /// Stall writes only, at the given point.
    pub fn stall_puts(&self, mode: PutStall) {
        *self.put_stall.lock().unwrap() = mode;
    }

    async fn maybe_stall(&self) {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn put(&self, key: &str, value: &[u8]) -> Result<TxId> {
        self.maybe_stall().await;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(injected("ledger put"));
        }
        let mode = *self.put_stall.lock().unwrap();
        match mode {
            PutStall::Never => self.inner.put(key, value).await,
            PutStall::BeforeApply => {
                tokio::time::sleep(STALL).await;
                self.inner.put(key, value).await
            }
            PutStall::AfterApply => {
                let tx_id = self.inner.put(key, value).await?;
                tokio::time::sleep(STALL).await;
                Ok(tx_id)
            }
            PutStall::AfterApplyWedged => {
                let tx_id = self.inner.put(key, value).await?;
                self.stall(true);
                tokio::time::sleep(STALL).await;
                Ok(tx_id)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.maybe_stall().await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<TxId> {
        self.maybe_stall().await;
        self.inner.delete(key).await
    }

    async fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        self.maybe_stall().await;
        self.inner.history(key).await
    }

    async fn rich_query(&self, selector: &Selector) -> Result<Vec<(String, Vec<u8>)>> {
        self.maybe_stall().await;
        self.inner.rich_query(selector).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob store
// ─────────────────────────────────────────────────────────────────────────────

/// A [`MemoryBlobStore`] whose uploads, links and unlinks can fail, and
/// whose links can stall.
#[derive(Default)]
pub struct FlakyBlobs {
    pub inner: MemoryBlobStore,
    fail_puts: AtomicBool,
    fail_links: AtomicBool,
    fail_unlinks: AtomicBool,
    stall_links: AtomicBool,
}

impl FlakyBlobs {
    pub fn fail_puts(&self, on: bool) {
        self.fail_puts.store(on, Ordering::SeqCst);
    }

    pub fn fail_links(&self, on: bool) {
        self.fail_links.store(on, Ordering::SeqCst);
    }

    pub fn fail_unlinks(&self, on: bool) {
        self.fail_unlinks.store(on, Ordering::SeqCst);
    }

    pub fn stall_links(&self, on: bool) {
        self.stall_links.store(on, Ordering::SeqCst);
    }

    pub fn blob_count(&self) -> usize {
        self.inner.blob_count()
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.inner.contains(id)
    }
}

#[async_trait]
impl BlobStore for FlakyBlobs {
    async fn put_blob(&self, bytes: Bytes) -> Result<ContentId> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(injected("blob put"));
        }
        self.inner.put_blob(bytes).await
    }

    async fn get_blob(&self, id: &ContentId) -> Result<Bytes> {
        self.inner.get_blob(id).await
    }

    async fn unlink(&self, id: &ContentId) -> Result<()> {
        if self.fail_unlinks.load(Ordering::SeqCst) {
            return Err(injected("blob unlink"));
        }
        self.inner.unlink(id).await
    }

    async fn new_directory(&self) -> Result<ContentId> {
        self.inner.new_directory().await
    }

    async fn link_child(
        &self,
        parent: &ContentId,
        name: &str,
        child: &ContentId,
    ) -> Result<ContentId> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(injected("blob link"));
        }
        if self.stall_links.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
        self.inner.link_child(parent, name, child).await
    }

    async fn unlink_child(&self, parent: &ContentId, name: &str) -> Result<ContentId> {
        self.inner.unlink_child(parent, name).await
    }

    async fn list_children(&self, parent: &ContentId) -> Result<BTreeMap<String, ContentId>> {
        self.inner.list_children(parent).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key store
// ─────────────────────────────────────────────────────────────────────────────

/// A [`MemoryKeyStore`] whose writes can stall.
#[derive(Default)]
pub struct FlakyKeys {
    pub inner: MemoryKeyStore,
    stall_puts: AtomicBool,
}

impl FlakyKeys {
    pub fn stall_puts(&self, on: bool) {
        self.stall_puts.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyStore for FlakyKeys {
    async fn put_key(&self, key_ref: &KeyRef, sealed: &[u8]) -> Result<()> {
        if self.stall_puts.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
        self.inner.put_key(key_ref, sealed).await
    }

    async fn get_key(&self, key_ref: &KeyRef) -> Result<Option<Vec<u8>>> {
        self.inner.get_key(key_ref).await
    }

    async fn delete_key(&self, key_ref: &KeyRef) -> Result<()> {
        self.inner.delete_key(key_ref).await
    }
}

/// Sealed version keys currently held.
pub fn key_count(vault: &TestVault) -> usize {
    vault.keys().inner.len()
}

/// Whether the key store still holds `key_ref`.
pub async fn has_key(vault: &TestVault, key_ref: &KeyRef) -> bool {
    vault.keys().get_key(key_ref).await.unwrap().is_some()
}
