//! Error types for idvault core.

use thiserror::Error;

use crate::fields::RequestType;
use crate::request::RequestStatus;

/// Errors raised by the pure data model.
///
/// Every variant is detected before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown or non-shareable field: {0}")]
    InvalidField(String),

    #[error("field set must not be empty")]
    EmptyFieldSet,

    #[error("field selection is for {actual} but the request is {expected}")]
    RequestTypeMismatch {
        expected: RequestType,
        actual: RequestType,
    },

    #[error("requester and recipient must be different accounts")]
    SelfRequest,

    #[error("request is {status}, only pending requests can change")]
    StatusConflict { status: RequestStatus },

    #[error("document already exists: {0}")]
    DuplicateDocument(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("version {version} not found in document {document}")]
    VersionNotFound { document: String, version: u32 },

    #[error("version {got} cannot follow, expected {expected}")]
    InvalidVersion { expected: u32, got: u32 },

    #[error("document {0} has no version numbers left")]
    VersionsExhausted(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
