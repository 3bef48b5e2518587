//! # idvault Core
//!
//! Pure data model for idvault: identity accounts, versioned document
//! directories, and consent-based share requests.
//!
//! This crate contains no I/O, no storage, no cryptography beyond identifier
//! hashing. It is pure computation over the records the engine persists.
//!
//! ## Key Types
//!
//! - [`PersonAccount`] - One identity and the documents it owns
//! - [`DocumentDirectory`] - One named document and its ordered versions
//! - [`DocumentVersion`] - Metadata for one immutable encrypted artifact
//! - [`ShareRequest`] - A pending or resolved disclosure request
//! - [`FieldSelection`] - A validated set of shareable fields for one request type
//!
//! ## Identifiers
//!
//! A [`PublicId`] is a one-way Blake3 derivation of the account's
//! [`PrivateId`]. All identifiers serialize as lowercase hex so persisted
//! records stay JSON-compatible and queryable.

pub mod account;
pub mod document;
pub mod error;
pub mod fields;
pub mod request;
pub mod types;
pub mod validation;

pub use account::{AccountData, AccountProfile, PersonAccount};
pub use document::{normalize_document_name, DocumentData, DocumentDirectory, DocumentVersion};
pub use error::{CoreError, Result};
pub use fields::{
    AccountField, DocumentField, FieldSelection, FieldSource, RequestType, DOCUMENT_COPY,
    FINGERPRINT_SEPARATOR,
};
pub use request::{RequestStatus, RequestTarget, ShareRequest};
pub use types::{now_millis, ContentId, KeyMaterial, KeyRef, PrivateId, PublicId, RequestId};
