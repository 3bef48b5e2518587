//! The Vault: the engine's handle on its collaborators.
//!
//! Operations are grouped by concern in [`accounts`](crate::accounts),
//! [`documents`](crate::documents) and [`requests`](crate::requests); this
//! module holds the shared plumbing they all use: lifecycle, timed
//! collaborator calls, account record I/O, and the bookkeeping that undoes
//! partial mutations.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use idvault_core::{ContentId, KeyRef, PersonAccount, PublicId, RequestId};
use idvault_crypto::{AccountKey, AccountRecordCodec, KdfSalt};
use idvault_store::{BlobStore, KeyStore, Ledger, StoreError};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::locks::KeyedLocks;

/// The identity vault engine.
///
/// Owns handles to a [`Ledger`], a [`BlobStore`] and a [`KeyStore`], and
/// serializes every read-modify-write cycle per account and per request.
/// Safe to share across tasks behind an `Arc`.
pub struct Vault<L: Ledger, B: BlobStore, K: KeyStore> {
    ledger: Arc<L>,
    blobs: Arc<B>,
    keys: Arc<K>,
    config: VaultConfig,
    locks: KeyedLocks,
    closed: AtomicBool,
}

impl<L: Ledger, B: BlobStore, K: KeyStore> Vault<L, B, K> {
    /// Open a vault over the given collaborators.
    pub fn open(ledger: L, blobs: B, keys: K, config: VaultConfig) -> Self {
        info!(
            ledger_timeout = ?config.ledger_timeout,
            blob_timeout = ?config.blob_timeout,
            "vault opened"
        );
        Self {
            ledger: Arc::new(ledger),
            blobs: Arc::new(blobs),
            keys: Arc::new(keys),
            config,
            locks: KeyedLocks::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Close the vault. Every later operation fails with [`VaultError::Closed`].
    ///
    /// Operations already in flight run to completion.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("vault closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(VaultError::Closed);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Locks
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn lock_account(&self, id: &PublicId) -> OwnedMutexGuard<()> {
        self.locks.lock(account_key(id)).await
    }

    pub(crate) async fn lock_request(&self, id: &RequestId) -> OwnedMutexGuard<()> {
        self.locks.lock(request_key(id)).await
    }

    pub(crate) async fn lock_pair(
        &self,
        requester: &PublicId,
        recipient: &PublicId,
    ) -> OwnedMutexGuard<()> {
        self.locks
            .lock(format!("pair:{}:{}", requester.to_hex(), recipient.to_hex()))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Timed collaborator calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a Ledger or KeyStore call under the ledger timeout.
    pub(crate) async fn ledger_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        timed(self.config.ledger_timeout, operation, call).await
    }

    /// Run a BlobStore call under the blob timeout.
    pub(crate) async fn blob_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        timed(self.config.blob_timeout, operation, call).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Account records
    // ─────────────────────────────────────────────────────────────────────────

    /// Derive an account key off the async runtime.
    pub(crate) async fn derive_key(&self, passphrase: &str, salt: KdfSalt) -> Result<AccountKey> {
        let passphrase = Zeroizing::new(passphrase.to_string());
        let params = self.config.kdf;
        let key = tokio::task::spawn_blocking(move || {
            AccountKey::derive(&passphrase, &salt, &params)
        })
        .await
        .map_err(|e| VaultError::Task(e.to_string()))??;
        Ok(key)
    }

    /// Fetch the stored envelope of a live account.
    pub(crate) async fn load_record(&self, id: &PublicId) -> Result<AccountRecord> {
        let key = account_key(id);
        let bytes = self
            .ledger_call("ledger.get", self.ledger.get(&key))
            .await?
            .ok_or(VaultError::AccountNotFound(*id))?;
        AccountRecord::parse(&key, &bytes)
    }

    /// Whether a live account exists under `id`.
    pub(crate) async fn account_exists(&self, id: &PublicId) -> Result<bool> {
        Ok(self
            .ledger_call("ledger.get", self.ledger.get(&account_key(id)))
            .await?
            .is_some())
    }

    /// Load and decrypt an account.
    pub(crate) async fn load_account(
        &self,
        id: &PublicId,
        key: &AccountKey,
    ) -> Result<(PersonAccount, KdfSalt)> {
        let record = self.load_record(id).await?;
        let account = record.open(id, key)?;
        Ok((account, record.kdf_salt))
    }

    /// Encrypt and persist an account.
    pub(crate) async fn store_account(
        &self,
        account: &PersonAccount,
        salt: KdfSalt,
        key: &AccountKey,
    ) -> Result<()> {
        let record = AccountRecord::seal(account, salt, key)?;
        let bytes = record.to_bytes(&account.public_id)?;
        self.put_confirmed(&account_key(&account.public_id), &bytes)
            .await
    }

    /// Write a ledger value, reading it back if the write times out.
    ///
    /// A timed-out write that is found in place counts as committed. One
    /// that is found absent or different stays a [`VaultError::Timeout`].
    /// If the read-back fails too, the outcome is unknown and the call
    /// fails with [`VaultError::Unconfirmed`].
    pub(crate) async fn put_confirmed(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let operation = "ledger.put";
        match self.ledger_call(operation, self.ledger.put(key, bytes)).await {
            Ok(_) => Ok(()),
            Err(VaultError::Timeout { .. }) => {
                match self.ledger_call("ledger.get", self.ledger.get(key)).await {
                    Ok(Some(stored)) if stored == bytes => {
                        warn!(key, "timed out write found committed");
                        Ok(())
                    }
                    Ok(_) => Err(VaultError::Timeout { operation }),
                    Err(e) => {
                        error!(key, error = %e, "could not confirm timed out write");
                        Err(VaultError::Unconfirmed {
                            operation,
                            reason: e.to_string(),
                        })
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Partial-failure handling
    // ─────────────────────────────────────────────────────────────────────────

    /// Finish a mutation: release what it superseded or retired on success,
    /// undo what it created on failure.
    ///
    /// A mutation whose ledger write is [`VaultError::Unconfirmed`] may have
    /// committed, so nothing is released either way.
    pub(crate) async fn settle<T>(&self, mutation: Mutation, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.cleanup(&mutation.superseded, &mutation.retired_keys)
                    .await?;
                Ok(value)
            }
            Err(unconfirmed @ VaultError::Unconfirmed { .. }) => {
                error!(
                    error = %unconfirmed,
                    blobs = mutation.created_blobs.len(),
                    keys = mutation.created_keys.len(),
                    "mutation outcome unknown, keeping its material"
                );
                Err(unconfirmed)
            }
            Err(original) => Err(self.compensate(mutation, original).await),
        }
    }

    async fn compensate(&self, mutation: Mutation, original: VaultError) -> VaultError {
        if mutation.is_empty() {
            return original;
        }

        let failures = self
            .release(&mutation.created_blobs, &mutation.created_keys)
            .await;
        if failures.is_empty() {
            return original;
        }

        error!(
            error = %original,
            failures = ?failures,
            "compensation after failed mutation left material behind"
        );
        VaultError::Compensation {
            original: Box::new(original),
            failures,
        }
    }

    /// Release blob references and delete keys, collecting every failure.
    pub(crate) async fn release(&self, blobs: &[ContentId], keys: &[KeyRef]) -> Vec<String> {
        let mut failures = Vec::new();

        for id in blobs.iter().rev() {
            if let Err(e) = self.blob_call("blobs.unlink", self.blobs.unlink(id)).await {
                failures.push(format!("blob {id}: {e}"));
            }
        }
        for key_ref in keys {
            if let Err(e) = self
                .ledger_call("keys.delete", self.keys.delete_key(key_ref))
                .await
            {
                failures.push(format!("key {key_ref}: {e}"));
            }
        }

        failures
    }

    /// Release material removed by a committed mutation.
    ///
    /// Failures are reported as [`VaultError::Cleanup`]; the mutation itself
    /// has already taken effect.
    pub(crate) async fn cleanup(&self, blobs: &[ContentId], keys: &[KeyRef]) -> Result<()> {
        let failures = self.release(blobs, keys).await;
        if failures.is_empty() {
            return Ok(());
        }
        warn!(failures = ?failures, "cleanup after committed mutation failed");
        Err(VaultError::Cleanup { failures })
    }
}

async fn timed<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = std::result::Result<T, StoreError>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            warn!(operation, ?limit, "collaborator call timed out");
            Err(VaultError::Timeout { operation })
        }
    }
}

pub(crate) fn account_key(id: &PublicId) -> String {
    format!("account:{}", id.to_hex())
}

pub(crate) fn request_key(id: &RequestId) -> String {
    format!("request:{}", id.to_hex())
}

/// Ledger value for an account: the sealed aggregate plus its KDF salt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "docType", rename = "account", rename_all = "camelCase")]
pub(crate) struct AccountRecord {
    pub(crate) kdf_salt: KdfSalt,
    /// Hex of the AccountRecordCodec output.
    sealed: String,
}

impl AccountRecord {
    pub(crate) fn seal(account: &PersonAccount, kdf_salt: KdfSalt, key: &AccountKey) -> Result<Self> {
        let sealed = AccountRecordCodec::encode(account, key)?;
        Ok(Self {
            kdf_salt,
            sealed: hex::encode(sealed),
        })
    }

    pub(crate) fn parse(ledger_key: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| VaultError::CorruptRecord {
            key: ledger_key.to_string(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn to_bytes(&self, id: &PublicId) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| VaultError::CorruptRecord {
            key: account_key(id),
            reason: e.to_string(),
        })
    }

    /// Decrypt, checking the record belongs to `id`.
    pub(crate) fn open(&self, id: &PublicId, key: &AccountKey) -> Result<PersonAccount> {
        let corrupt = |reason: String| VaultError::CorruptRecord {
            key: account_key(id),
            reason,
        };

        let sealed = hex::decode(&self.sealed).map_err(|e| corrupt(e.to_string()))?;
        let account = AccountRecordCodec::decode(&sealed, key)?;
        if account.public_id != *id {
            return Err(corrupt(format!("record holds account {}", account.public_id)));
        }
        Ok(account)
    }
}

/// Material created and superseded by one in-progress mutation.
///
/// Every id here holds exactly one blob-store reference.
#[derive(Debug, Default)]
pub(crate) struct Mutation {
    created_blobs: Vec<ContentId>,
    created_keys: Vec<KeyRef>,
    superseded: Vec<ContentId>,
    retired_keys: Vec<KeyRef>,
}

impl Mutation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A reference this mutation took. Released if the mutation fails.
    pub(crate) fn created(&mut self, id: ContentId) -> ContentId {
        self.created_blobs.push(id);
        id
    }

    /// A key this mutation stored. Deleted if the mutation fails.
    pub(crate) fn created_key(&mut self, key_ref: KeyRef) {
        self.created_keys.push(key_ref);
    }

    /// A reference made obsolete by this mutation. Released once it commits.
    pub(crate) fn supersede(&mut self, id: ContentId) {
        self.superseded.push(id);
    }

    /// A key made obsolete by this mutation. Deleted once it commits.
    pub(crate) fn retire_key(&mut self, key_ref: KeyRef) {
        self.retired_keys.push(key_ref);
    }

    fn is_empty(&self) -> bool {
        self.created_blobs.is_empty() && self.created_keys.is_empty()
    }
}
