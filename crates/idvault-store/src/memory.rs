//! In-memory implementations of the collaborator traits.
//!
//! Same semantics as the persistent backends, nothing survives a drop.
//! Thread-safe via RwLock; a poisoned lock is recovered rather than
//! propagated since every mutation leaves the maps consistent.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use idvault_core::{now_millis, ContentId, KeyRef};

use crate::directory::DirectoryNode;
use crate::error::{Result, StoreError};
use crate::selector::Selector;
use crate::traits::{BlobStore, HistoryEntry, KeyStore, Ledger, TxId};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory ledger.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

struct MemoryLedgerInner {
    /// Full history per key, oldest first.
    entries: BTreeMap<String, Vec<HistoryEntry>>,

    next_tx: u64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner {
                entries: BTreeMap::new(),
                next_tx: 1,
            }),
        }
    }

    /// Number of keys with a live (non-tombstoned) value.
    pub fn live_keys(&self) -> usize {
        read(&self.inner)
            .entries
            .values()
            .filter(|h| h.last().map_or(false, |e| !e.is_tombstone()))
            .count()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerInner {
    fn append(&mut self, key: &str, value: Option<Vec<u8>>) -> TxId {
        let tx_id = TxId(self.next_tx);
        self.next_tx += 1;
        self.entries
            .entry(key.to_string())
            .or_default()
            .push(HistoryEntry {
                tx_id,
                value,
                timestamp: now_millis(),
            });
        tx_id
    }

    fn current(&self, key: &str) -> Option<&Vec<u8>> {
        self.entries.get(key)?.last()?.value.as_ref()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn put(&self, key: &str, value: &[u8]) -> Result<TxId> {
        Ok(write(&self.inner).append(key, Some(value.to_vec())))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(read(&self.inner).current(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<TxId> {
        Ok(write(&self.inner).append(key, None))
    }

    async fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        Ok(read(&self.inner)
            .entries
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn rich_query(&self, selector: &Selector) -> Result<Vec<(String, Vec<u8>)>> {
        let inner = read(&self.inner);
        Ok(inner
            .entries
            .keys()
            .filter_map(|key| {
                let value = inner.current(key)?;
                selector
                    .matches_bytes(value)
                    .then(|| (key.clone(), value.clone()))
            })
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory content-addressed blob store with reference counting.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentId, StoredBlob>>,
}

struct StoredBlob {
    bytes: Bytes,
    refs: u32,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct blobs held.
    pub fn blob_count(&self) -> usize {
        read(&self.blobs).len()
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        read(&self.blobs).contains_key(id)
    }

    /// Outstanding references to `id` (0 if absent).
    pub fn ref_count(&self, id: &ContentId) -> u32 {
        read(&self.blobs).get(id).map_or(0, |b| b.refs)
    }

    fn insert(&self, bytes: Bytes) -> ContentId {
        let id = ContentId::for_content(&bytes);
        write(&self.blobs)
            .entry(id)
            .and_modify(|b| b.refs += 1)
            .or_insert(StoredBlob { bytes, refs: 1 });
        id
    }

    fn directory(&self, id: &ContentId) -> Result<DirectoryNode> {
        let bytes = read(&self.blobs)
            .get(id)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(format!("directory {id}")))?;
        DirectoryNode::from_bytes(&bytes)
    }

    fn store_directory(&self, node: &DirectoryNode) -> Result<ContentId> {
        Ok(self.insert(Bytes::from(node.to_bytes()?)))
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_blob(&self, bytes: Bytes) -> Result<ContentId> {
        Ok(self.insert(bytes))
    }

    async fn get_blob(&self, id: &ContentId) -> Result<Bytes> {
        read(&self.blobs)
            .get(id)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(format!("blob {id}")))
    }

    async fn unlink(&self, id: &ContentId) -> Result<()> {
        let mut blobs = write(&self.blobs);
        let blob = blobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("blob {id}")))?;
        blob.refs -= 1;
        if blob.refs == 0 {
            blobs.remove(id);
        }
        Ok(())
    }

    async fn new_directory(&self) -> Result<ContentId> {
        self.store_directory(&DirectoryNode::new())
    }

    async fn link_child(
        &self,
        parent: &ContentId,
        name: &str,
        child: &ContentId,
    ) -> Result<ContentId> {
        if !self.contains(child) {
            return Err(StoreError::NotFound(format!("blob {child}")));
        }
        let node = self.directory(parent)?.with_link(name, *child);
        self.store_directory(&node)
    }

    async fn unlink_child(&self, parent: &ContentId, name: &str) -> Result<ContentId> {
        let node = self.directory(parent)?.without_link(name)?;
        self.store_directory(&node)
    }

    async fn list_children(&self, parent: &ContentId) -> Result<BTreeMap<String, ContentId>> {
        Ok(self.directory(parent)?.links)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory key store.
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<KeyRef, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        read(&self.keys).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.keys).is_empty()
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn put_key(&self, key_ref: &KeyRef, sealed: &[u8]) -> Result<()> {
        write(&self.keys).insert(*key_ref, sealed.to_vec());
        Ok(())
    }

    async fn get_key(&self, key_ref: &KeyRef) -> Result<Option<Vec<u8>>> {
        Ok(read(&self.keys).get(key_ref).cloned())
    }

    async fn delete_key(&self, key_ref: &KeyRef) -> Result<()> {
        write(&self.keys).remove(key_ref);
        Ok(())
    }
}
