//! The share-request protocol.
//!
//! ## States
//!
//! ```text
//! pending ──accept──▶ accepted
//!    │  └──reject──▶ rejected
//!    └──update──▶ pending (new field set)
//! ```
//!
//! Accepted and rejected requests are final. Updating one creates a new
//! pending request that records the one it supersedes.
//!
//! ## Duplicates
//!
//! At most one pending request may exist per requester, recipient, request
//! type, document and field fingerprint. The check and the insert run under
//! a lock on the (requester, recipient) pair.
//!
//! Requests are stored in plaintext so the Ledger can answer rich queries
//! over them. Pending requests carry field names only; accepted requests
//! carry the values the recipient chose to disclose.

use tracing::{debug, info};

use idvault_core::{
    now_millis, CoreError, DocumentDirectory, FieldSelection, FieldSource, PublicId,
    RequestId, RequestStatus, RequestTarget, RequestType, ShareRequest, DOCUMENT_COPY,
};
use idvault_crypto::AccountKey;
use idvault_store::{BlobStore, KeyStore, Ledger, Selector};

use crate::error::{Result, VaultError};
use crate::vault::{request_key, Vault};

/// Filter for [`Vault::find_requests`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub requester: Option<PublicId>,
    pub recipient: Option<PublicId>,
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub document_name: Option<String>,
}

impl RequestQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requester(mut self, id: PublicId) -> Self {
        self.requester = Some(id);
        self
    }

    pub fn recipient(mut self, id: PublicId) -> Self {
        self.recipient = Some(id);
        self
    }

    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = Some(request_type);
        self
    }

    pub fn document_name(mut self, name: &str) -> Self {
        self.document_name = Some(name.trim().to_lowercase());
        self
    }

    fn selector(&self) -> Selector {
        Selector::new()
            .eq("docType", "shareRequest")
            .eq_opt("requesterPublicId", self.requester.map(|id| id.to_hex()))
            .eq_opt("recipientPublicId", self.recipient.map(|id| id.to_hex()))
            .eq_opt("status", self.status.map(|s| s.as_str()))
            .eq_opt("requestType", self.request_type.map(|t| t.as_str()))
            .eq_opt("documentName", self.document_name.clone())
    }
}

/// Result of [`Vault::update_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The pending request was updated in place.
    Updated(ShareRequest),
    /// The request was no longer pending; a new request replaces it.
    Superseded {
        previous: ShareRequest,
        request: ShareRequest,
    },
}

impl UpdateOutcome {
    /// The request that is now pending.
    pub fn request(&self) -> &ShareRequest {
        match self {
            UpdateOutcome::Updated(request) => request,
            UpdateOutcome::Superseded { request, .. } => request,
        }
    }
}

/// Decrypted copy of the latest document version, handed to the requester.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentCopy {
    pub version: u32,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for DocumentCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCopy")
            .field("version", &self.version)
            .field("content", &format_args!("{} bytes", self.content.len()))
            .finish()
    }
}

/// Result of [`Vault::accept_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub request: ShareRequest,
    /// Present when `documentCopy` was requested, accepted, and the
    /// document has at least one version.
    pub document_copy: Option<DocumentCopy>,
}

/// Field values of a document plus the version shared as its copy.
struct DisclosedDocument<'a> {
    directory: &'a DocumentDirectory,
    copy_version: Option<u32>,
}

impl FieldSource for DisclosedDocument<'_> {
    fn field_value(&self, name: &str) -> Option<String> {
        if name == DOCUMENT_COPY {
            return self.copy_version.map(|v| v.to_string());
        }
        self.directory.field_value(name)
    }
}

impl<L: Ledger, B: BlobStore, K: KeyStore> Vault<L, B, K> {
    // ─────────────────────────────────────────────────────────────────────────
    // Requester side
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask `recipient` to disclose `field_names` of `target`.
    ///
    /// Fails with [`VaultError::DuplicateRequest`] while an identical
    /// request is pending.
    pub async fn create_request<S: AsRef<str>>(
        &self,
        requester: &PublicId,
        recipient: &PublicId,
        target: RequestTarget,
        field_names: &[S],
    ) -> Result<ShareRequest> {
        self.ensure_open()?;
        let selection = FieldSelection::parse(target.request_type(), field_names)?;
        let request = ShareRequest::new(
            RequestId::generate(),
            *requester,
            *recipient,
            &target,
            &selection,
            now_millis(),
        )?;

        self.ensure_parties_exist(&request).await?;
        let _pair = self.lock_pair(requester, recipient).await;
        self.ensure_no_duplicate(&request).await?;
        self.put_request(&request).await?;

        info!(
            request = %request.public_id,
            requester = %requester,
            recipient = %recipient,
            request_type = %request.request_type,
            "share request created"
        );
        Ok(request)
    }

    /// Replace the requested field set.
    ///
    /// A pending request is updated in place. A request that is no longer
    /// pending is left untouched and a new pending request, linked through
    /// `supersedes`, is created instead.
    pub async fn update_request<S: AsRef<str>>(
        &self,
        id: &RequestId,
        requester: &PublicId,
        field_names: &[S],
    ) -> Result<UpdateOutcome> {
        self.ensure_open()?;
        let _guard = self.lock_request(id).await;

        let current = self.load_request(id).await?;
        if current.requester_public_id != *requester {
            return Err(VaultError::RequesterMismatch(*id));
        }
        let selection = FieldSelection::parse(current.request_type, field_names)?;
        let now = now_millis();

        if current.is_pending() {
            let mut updated = current.clone();
            updated.replace_fields(&selection, now)?;

            let _pair = self
                .lock_pair(&current.requester_public_id, &current.recipient_public_id)
                .await;
            self.ensure_no_duplicate(&updated).await?;
            self.put_request(&updated).await?;

            debug!(request = %id, fields = %updated.requested_field_fingerprint, "share request updated");
            return Ok(UpdateOutcome::Updated(updated));
        }

        let next = current.successor(RequestId::generate(), &selection, now)?;
        self.ensure_parties_exist(&next).await?;
        let _pair = self
            .lock_pair(&next.requester_public_id, &next.recipient_public_id)
            .await;
        self.ensure_no_duplicate(&next).await?;
        self.put_request(&next).await?;

        info!(
            previous = %id,
            status = %current.status,
            request = %next.public_id,
            "non-pending request superseded"
        );
        Ok(UpdateOutcome::Superseded {
            previous: current,
            request: next,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recipient side
    // ─────────────────────────────────────────────────────────────────────────

    /// Accept, disclosing the fields both requested and listed in
    /// `accepted_names`. Every other requested key is dropped.
    ///
    /// `recipient_key` opens the recipient's account to read current values
    /// and, for `documentCopy`, the latest document version.
    pub async fn accept_request<S: AsRef<str>>(
        &self,
        id: &RequestId,
        recipient: &PublicId,
        recipient_key: &AccountKey,
        accepted_names: &[S],
    ) -> Result<AcceptOutcome> {
        self.ensure_open()?;
        let _guard = self.lock_request(id).await;

        let mut request = self.load_request(id).await?;
        if request.recipient_public_id != *recipient {
            return Err(VaultError::RecipientMismatch(*id));
        }
        ensure_pending(&request)?;
        let accepted = FieldSelection::parse(request.request_type, accepted_names)?;
        let disclosed = request.disclosure(&accepted)?;

        let _account = self.lock_account(recipient).await;
        let (account, _) = self.load_account(recipient, recipient_key).await?;
        let now = now_millis();

        let document_copy = match request.target() {
            RequestTarget::Account => {
                request.accept(&disclosed, &account.account_data, now)?;
                None
            }
            RequestTarget::Document { name } => {
                let directory = account.document(&name)?;
                let copy = match directory.latest_version() {
                    Some(version) if disclosed.document_copy() => Some(DocumentCopy {
                        version: version.number,
                        content: self.read_sealed_version(version, recipient_key).await?,
                    }),
                    _ => None,
                };
                let source = DisclosedDocument {
                    directory,
                    copy_version: copy.as_ref().map(|c| c.version),
                };
                request.accept(&disclosed, &source, now)?;
                copy
            }
        };
        self.put_request(&request).await?;

        info!(
            request = %id,
            disclosed = %disclosed.fingerprint(),
            "share request accepted"
        );
        Ok(AcceptOutcome {
            request,
            document_copy,
        })
    }

    /// Reject. Nothing is disclosed.
    pub async fn reject_request(&self, id: &RequestId, recipient: &PublicId) -> Result<ShareRequest> {
        self.ensure_open()?;
        let _guard = self.lock_request(id).await;

        let mut request = self.load_request(id).await?;
        if request.recipient_public_id != *recipient {
            return Err(VaultError::RecipientMismatch(*id));
        }
        ensure_pending(&request)?;
        request.reject(now_millis())?;
        self.put_request(&request).await?;

        info!(request = %id, "share request rejected");
        Ok(request)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_request(&self, id: &RequestId) -> Result<ShareRequest> {
        self.ensure_open()?;
        self.load_request(id).await
    }

    /// Requests matching `query`, oldest first.
    pub async fn find_requests(&self, query: &RequestQuery) -> Result<Vec<ShareRequest>> {
        self.ensure_open()?;
        let rows = self
            .ledger_call("ledger.rich_query", self.ledger().rich_query(&query.selector()))
            .await?;

        let mut requests = rows
            .iter()
            .map(|(key, bytes)| parse_request(key, bytes))
            .collect::<Result<Vec<_>>>()?;
        requests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.public_id.cmp(&b.public_id))
        });
        Ok(requests)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn load_request(&self, id: &RequestId) -> Result<ShareRequest> {
        let key = request_key(id);
        let bytes = self
            .ledger_call("ledger.get", self.ledger().get(&key))
            .await?
            .ok_or(VaultError::RequestNotFound(*id))?;
        parse_request(&key, &bytes)
    }

    async fn put_request(&self, request: &ShareRequest) -> Result<()> {
        let key = request_key(&request.public_id);
        let bytes = serde_json::to_vec(request).map_err(|e| VaultError::CorruptRecord {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.put_confirmed(&key, &bytes).await
    }

    async fn ensure_parties_exist(&self, request: &ShareRequest) -> Result<()> {
        for id in [&request.requester_public_id, &request.recipient_public_id] {
            if !self.account_exists(id).await? {
                return Err(VaultError::AccountNotFound(*id));
            }
        }
        Ok(())
    }

    /// Fail if another pending request matches `request`. The request's own
    /// record never counts as a duplicate of itself.
    async fn ensure_no_duplicate(&self, request: &ShareRequest) -> Result<()> {
        let selector = Selector::new()
            .eq("docType", "shareRequest")
            .eq("requesterPublicId", request.requester_public_id.to_hex())
            .eq("recipientPublicId", request.recipient_public_id.to_hex())
            .eq(
                "requestedFieldFingerprint",
                request.requested_field_fingerprint.as_str(),
            )
            .eq("status", RequestStatus::Pending.as_str())
            .eq("requestType", request.request_type.as_str())
            .eq_opt("documentName", request.document_name.clone());

        let own_key = request_key(&request.public_id);
        let rows = self
            .ledger_call("ledger.rich_query", self.ledger().rich_query(&selector))
            .await?;

        if let Some((key, bytes)) = rows.iter().find(|(key, _)| *key != own_key) {
            let existing = parse_request(key, bytes)?;
            return Err(VaultError::DuplicateRequest {
                existing: existing.public_id,
            });
        }
        Ok(())
    }
}

fn ensure_pending(request: &ShareRequest) -> Result<()> {
    if request.is_pending() {
        return Ok(());
    }
    Err(CoreError::StatusConflict {
        status: request.status,
    }
    .into())
}

fn parse_request(key: &str, bytes: &[u8]) -> Result<ShareRequest> {
    serde_json::from_slice(bytes).map_err(|e| VaultError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
