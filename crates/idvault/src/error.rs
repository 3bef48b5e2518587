//! Error types for the Vault.

use idvault_core::{CoreError, PublicId, RequestId};
use idvault_crypto::CryptoError;
use idvault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Model-level error: validation, conflict, or missing document/version.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Cryptographic error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// No live account under this public id.
    #[error("account not found: {0}")]
    AccountNotFound(PublicId),

    /// No request under this id.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// A pending request with the same parties and field set already exists.
    #[error("duplicate pending request: {existing}")]
    DuplicateRequest { existing: RequestId },

    /// The caller is not the request's recipient.
    #[error("caller is not the recipient of request {0}")]
    RecipientMismatch(RequestId),

    /// The caller is not the request's requester.
    #[error("caller is not the requester of request {0}")]
    RequesterMismatch(RequestId),

    /// A stored record could not be parsed.
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// A collaborator call exceeded its configured timeout.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// A ledger write timed out and could not be read back, so whether it
    /// took effect is unknown. Nothing the mutation created was released.
    #[error("{operation} outcome unknown: {reason}")]
    Unconfirmed {
        operation: &'static str,
        reason: String,
    },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// A mutation failed and undoing its partial effects also failed.
    #[error("{original}; compensation failed: {}", failures.join("; "))]
    Compensation {
        original: Box<VaultError>,
        failures: Vec<String>,
    },

    /// A mutation committed but releasing the material it removed failed.
    #[error("committed, but cleanup failed: {}", failures.join("; "))]
    Cleanup { failures: Vec<String> },

    /// The vault has been closed.
    #[error("vault is closed")]
    Closed,
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input, rejected before any I/O.
    Validation,
    /// The account, document, version or request is absent.
    NotFound,
    /// The request conflicts with current state.
    Conflict,
    /// Decryption, authentication or unwrap failed.
    Cryptographic,
    /// A collaborator is unreachable, failing or slow.
    Infrastructure,
    /// Some steps of a mutation took effect and could not be undone.
    PartialFailure,
}

impl VaultError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VaultError::Core(e) => match e {
                CoreError::InvalidInput(_)
                | CoreError::InvalidField(_)
                | CoreError::EmptyFieldSet
                | CoreError::RequestTypeMismatch { .. }
                | CoreError::SelfRequest
                | CoreError::InvalidVersion { .. } => ErrorCategory::Validation,
                CoreError::StatusConflict { .. }
                | CoreError::DuplicateDocument(_)
                | CoreError::VersionsExhausted(_) => ErrorCategory::Conflict,
                CoreError::DocumentNotFound(_) | CoreError::VersionNotFound { .. } => {
                    ErrorCategory::NotFound
                }
            },
            VaultError::Crypto(CryptoError::KeyDerivation(_)) => ErrorCategory::Validation,
            VaultError::Crypto(_) | VaultError::CorruptRecord { .. } => {
                ErrorCategory::Cryptographic
            }
            VaultError::Store(StoreError::NotFound(_)) => ErrorCategory::NotFound,
            VaultError::Store(_) | VaultError::Timeout { .. } | VaultError::Task(_) => {
                ErrorCategory::Infrastructure
            }
            VaultError::AccountNotFound(_) | VaultError::RequestNotFound(_) => {
                ErrorCategory::NotFound
            }
            VaultError::DuplicateRequest { .. }
            | VaultError::RecipientMismatch(_)
            | VaultError::RequesterMismatch(_)
            | VaultError::Closed => ErrorCategory::Conflict,
            VaultError::Compensation { .. }
            | VaultError::Cleanup { .. }
            | VaultError::Unconfirmed { .. } => ErrorCategory::PartialFailure,
        }
    }

    /// Whether the caller may retry the same call with backoff.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    /// The underlying error of a failed compensation, or `self`.
    pub fn root(&self) -> &VaultError {
        match self {
            VaultError::Compensation { original, .. } => original.root(),
            other => other,
        }
    }
}
