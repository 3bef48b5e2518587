//! Collaborator traits: the abstract interfaces the engine consumes.
//!
//! These allow the engine to be storage-agnostic. Every method is async and
//! may be slow or fail; callers wrap them in timeouts.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

use idvault_core::{ContentId, KeyRef};

use crate::error::Result;
use crate::selector::Selector;

/// Ledger transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// One entry in a key's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub tx_id: TxId,
    /// `None` marks a tombstone.
    pub value: Option<Vec<u8>>,
    /// When the entry was written (Unix ms).
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// The Ledger trait: keyed, queryable, versioned store of record.
///
/// # Design Notes
///
/// - `put` is atomic for a single key. No multi-key transactions.
/// - There is no compare-and-swap; callers serialize read-modify-write.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Write the current value of `key`.
    async fn put(&self, key: &str, value: &[u8]) -> Result<TxId>;

    /// Read the current value of `key`, or `None` if absent or deleted.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Tombstone `key`. Its history is kept.
    async fn delete(&self, key: &str) -> Result<TxId>;

    /// Every write and tombstone for `key`, oldest first.
    async fn history(&self, key: &str) -> Result<Vec<HistoryEntry>>;

    /// Current `(key, value)` pairs whose JSON value matches `selector`.
    ///
    /// Values that are not JSON objects never match.
    async fn rich_query(&self, selector: &Selector) -> Result<Vec<(String, Vec<u8>)>>;
}

/// The BlobStore trait: content-addressed storage with directory links.
///
/// Directory linkage is copy-on-write: each structural change yields a new
/// directory reference, and the superseded one must be released with
/// [`BlobStore::unlink`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Blobs
    // ─────────────────────────────────────────────────────────────────────────

    /// Store bytes and take a reference to them.
    async fn put_blob(&self, bytes: Bytes) -> Result<ContentId>;

    /// Fetch bytes. Fails with `NotFound` if no reference remains.
    async fn get_blob(&self, id: &ContentId) -> Result<Bytes>;

    /// Release one reference. The blob is removed when none remain.
    async fn unlink(&self, id: &ContentId) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty directory and take a reference to it.
    async fn new_directory(&self) -> Result<ContentId>;

    /// A new directory equal to `parent` plus `name -> child`.
    async fn link_child(
        &self,
        parent: &ContentId,
        name: &str,
        child: &ContentId,
    ) -> Result<ContentId>;

    /// A new directory equal to `parent` without `name`.
    async fn unlink_child(&self, parent: &ContentId, name: &str) -> Result<ContentId>;

    /// The links of a directory.
    async fn list_children(&self, parent: &ContentId) -> Result<BTreeMap<String, ContentId>>;
}

/// The KeyStore trait: storage for sealed private keys.
///
/// Values are opaque ciphertext; the store never sees key material.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn put_key(&self, key_ref: &KeyRef, sealed: &[u8]) -> Result<()>;

    async fn get_key(&self, key_ref: &KeyRef) -> Result<Option<Vec<u8>>>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete_key(&self, key_ref: &KeyRef) -> Result<()>;
}
