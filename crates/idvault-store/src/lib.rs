//! # idvault Store
//!
//! The external collaborators the engine talks to, behind async traits.
//!
//! ## Overview
//!
//! - [`Ledger`] - keyed, versioned record store with per-key history and
//!   rich queries over JSON values
//! - [`BlobStore`] - content-addressed blob store with copy-on-write
//!   directory links
//! - [`KeyStore`] - holds sealed per-version private keys
//!
//! ## Implementations
//!
//! - [`SqliteLedger`] - append-only SQLite ledger
//! - [`MemoryLedger`], [`MemoryBlobStore`], [`MemoryKeyStore`] - in-memory
//!   implementations for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use idvault_store::{Ledger, Selector, SqliteLedger};
//!
//! async fn example() {
//!     let ledger = SqliteLedger::open("ledger.db").unwrap();
//!
//!     ledger.put("request:abc", br#"{"status":"pending"}"#).await.unwrap();
//!
//!     let pending = ledger
//!         .rich_query(&Selector::new().eq("status", "pending"))
//!         .await
//!         .unwrap();
//!     assert_eq!(pending.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single-key atomicity**: `put` is atomic per key; nothing spans keys.
//! - **Tombstones**: `delete` appends a tombstone, so history survives.
//! - **Reference counts**: every `put_blob`, `new_directory` and `link_child`
//!   result holds one reference that the caller must release with `unlink`.

pub mod directory;
pub mod error;
pub mod memory;
pub mod migration;
pub mod selector;
pub mod sqlite;
pub mod traits;

pub use directory::DirectoryNode;
pub use error::{Result, StoreError};
pub use memory::{MemoryBlobStore, MemoryKeyStore, MemoryLedger};
pub use selector::Selector;
pub use sqlite::SqliteLedger;
pub use traits::{BlobStore, HistoryEntry, KeyStore, Ledger, TxId};
