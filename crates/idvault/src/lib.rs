//! # idvault
//!
//! An encrypted identity vault: accounts, versioned documents, and
//! consent-based disclosure of their fields.
//!
//! ## Overview
//!
//! - **Accounts**: a person's fields and documents, sealed as one record
//!   under a passphrase-derived key
//! - **Documents**: named directories of immutable versions, each sealed
//!   under its own content key and key pair
//! - **Share requests**: one account asks another for specific fields; the
//!   recipient discloses only what was both requested and accepted
//!
//! ## Usage
//!
//! ```rust,no_run
//! use idvault::{Vault, VaultConfig};
//! use idvault::core::{AccountProfile, RequestTarget};
//! use idvault::store::{MemoryBlobStore, MemoryKeyStore, SqliteLedger};
//!
//! async fn example() -> idvault::Result<()> {
//!     let vault = Vault::open(
//!         SqliteLedger::open("ledger.db")?,
//!         MemoryBlobStore::new(),
//!         MemoryKeyStore::new(),
//!         VaultConfig::default(),
//!     );
//!
//!     let anna = vault
//!         .create_account(&AccountProfile::new("anna", "angelova", "anna@x.io", "555"), "pw")
//!         .await?;
//!     vault
//!         .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"scan")
//!         .await?;
//!
//!     let bank = vault
//!         .create_account(&AccountProfile::new("bank", "kyc", "kyc@bank.io", ""), "pw2")
//!         .await?;
//!     let request = vault
//!         .create_request(
//!             &bank.public_id,
//!             &anna.public_id,
//!             RequestTarget::document("passport"),
//!             &["holder", "countryIssue"],
//!         )
//!         .await?;
//!
//!     let outcome = vault
//!         .accept_request(&request.public_id, &anna.public_id, &anna.key, &["holder"])
//!         .await?;
//!     assert_eq!(outcome.request.data["holder"], "anna");
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Per-key serialization**: the Ledger has no compare-and-swap, so every
//!   read-decrypt-modify-encrypt-write cycle holds a lock on its account or
//!   request id.
//! - **Timeouts**: every collaborator call runs under a configured timeout.
//!   A timed-out ledger write is read back before anything is undone; if
//!   the read fails as well the error is [`VaultError::Unconfirmed`] and
//!   nothing is released.
//! - **Compensation**: a mutation that fails part-way releases the blobs and
//!   keys it created before returning; if that release fails too, the error
//!   is [`VaultError::Compensation`]. Once a mutation commits, failing to
//!   release what it replaced is reported as [`VaultError::Cleanup`].
//!
//! ## Re-exports
//!
//! - `idvault::core` - data model (accounts, documents, requests, fields)
//! - `idvault::crypto` - envelope encryption and the account record codec
//! - `idvault::store` - collaborator traits and their implementations

pub mod accounts;
pub mod config;
pub mod documents;
pub mod error;
mod locks;
pub mod requests;
pub mod vault;

// Re-export component crates
pub use idvault_core as core;
pub use idvault_crypto as crypto;
pub use idvault_store as store;

pub use accounts::{AccountCredentials, AccountRevision};
pub use config::VaultConfig;
pub use error::{ErrorCategory, Result, VaultError};
pub use requests::{AcceptOutcome, DocumentCopy, RequestQuery, UpdateOutcome};
pub use vault::Vault;

// Commonly used model types
pub use idvault_core::{
    AccountField, AccountProfile, DocumentDirectory, DocumentField, DocumentVersion,
    PersonAccount, PublicId, RequestId, RequestStatus, RequestTarget, RequestType, ShareRequest,
};
pub use idvault_crypto::{AccountKey, KdfParams};
