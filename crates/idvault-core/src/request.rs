//! Share requests: the consent state machine.
//!
//! ```text
//! pending ──accept──▶ accepted
//!    │  ╲
//!    │   ╲─reject──▶ rejected
//!    └──update──▶ pending (new field set)
//! ```
//!
//! Accepted and rejected are terminal. This module holds the pure
//! transitions; persistence, duplicate detection and the stale-update policy
//! live in the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, Result};
use crate::fields::{FieldSelection, FieldSource, RequestType};
use crate::types::{PublicId, RequestId};
use crate::validation::require_text;

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a request asks about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    Account,
    Document { name: String },
}

impl RequestTarget {
    pub fn document(name: impl Into<String>) -> Self {
        RequestTarget::Document { name: name.into() }
    }

    pub fn request_type(&self) -> RequestType {
        match self {
            RequestTarget::Account => RequestType::Account,
            RequestTarget::Document { .. } => RequestType::Document,
        }
    }
}

/// A consent request from one account to another.
///
/// Persisted as JSON with a `docType` tag so ledger rich queries can find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "docType", rename = "shareRequest", rename_all = "camelCase")]
pub struct ShareRequest {
    pub public_id: RequestId,
    pub request_type: RequestType,
    pub requester_public_id: PublicId,
    pub recipient_public_id: PublicId,
    pub requested_field_fingerprint: String,
    /// Requested names with empty values while pending; disclosed values
    /// once accepted; empty once rejected.
    pub data: BTreeMap<String, String>,
    pub status: RequestStatus,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_copy: Option<bool>,
    /// The non-pending request this one replaced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<RequestId>,
}

impl ShareRequest {
    /// Create a pending request.
    pub fn new(
        public_id: RequestId,
        requester: PublicId,
        recipient: PublicId,
        target: &RequestTarget,
        selection: &FieldSelection,
        now: i64,
    ) -> Result<Self> {
        if requester == recipient {
            return Err(CoreError::SelfRequest);
        }
        check_type(target.request_type(), selection)?;

        let document_name = match target {
            RequestTarget::Account => None,
            RequestTarget::Document { name } => {
                Some(require_text("document name", name)?.to_lowercase())
            }
        };

        let mut request = Self {
            public_id,
            request_type: target.request_type(),
            requester_public_id: requester,
            recipient_public_id: recipient,
            requested_field_fingerprint: String::new(),
            data: BTreeMap::new(),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            document_name,
            document_copy: None,
            supersedes: None,
        };
        request.set_requested(selection);
        Ok(request)
    }

    /// The target this request was made against.
    pub fn target(&self) -> RequestTarget {
        match (&self.request_type, &self.document_name) {
            (RequestType::Document, Some(name)) => RequestTarget::document(name.clone()),
            _ => RequestTarget::Account,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// The requested selection, rebuilt from the fingerprint.
    pub fn requested(&self) -> Result<FieldSelection> {
        FieldSelection::from_fingerprint(self.request_type, &self.requested_field_fingerprint)
    }

    /// Replace the requested field set. Only valid while pending.
    pub fn replace_fields(&mut self, selection: &FieldSelection, now: i64) -> Result<()> {
        self.ensure_pending()?;
        check_type(self.request_type, selection)?;
        self.set_requested(selection);
        self.updated_at = now;
        Ok(())
    }

    /// The selection that accepting with `accepted` would disclose:
    /// requested ∩ accepted.
    pub fn disclosure(&self, accepted: &FieldSelection) -> Result<FieldSelection> {
        self.ensure_pending()?;
        check_type(self.request_type, accepted)?;
        Ok(self.requested()?.intersect(accepted))
    }

    /// Accept, populating only the names in `disclosed` from `source`.
    ///
    /// Every other requested key is dropped from `data`.
    pub fn accept(
        &mut self,
        disclosed: &FieldSelection,
        source: &dyn FieldSource,
        now: i64,
    ) -> Result<()> {
        self.ensure_pending()?;
        check_type(self.request_type, disclosed)?;

        let mut data = BTreeMap::new();
        for name in disclosed.names() {
            if let Some(value) = source.field_value(name) {
                data.insert(name.to_string(), value);
            }
        }

        self.data = data;
        self.status = RequestStatus::Accepted;
        self.updated_at = now;
        Ok(())
    }

    /// Reject. No data is ever disclosed.
    pub fn reject(&mut self, now: i64) -> Result<()> {
        self.ensure_pending()?;
        self.data.clear();
        self.status = RequestStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    /// A fresh pending request with the same parties and target that
    /// records which request it supersedes.
    pub fn successor(
        &self,
        public_id: RequestId,
        selection: &FieldSelection,
        now: i64,
    ) -> Result<Self> {
        let mut next = Self::new(
            public_id,
            self.requester_public_id,
            self.recipient_public_id,
            &self.target(),
            selection,
            now,
        )?;
        next.supersedes = Some(self.public_id);
        Ok(next)
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(CoreError::StatusConflict {
                status: self.status,
            })
        }
    }

    fn set_requested(&mut self, selection: &FieldSelection) {
        self.requested_field_fingerprint = selection.fingerprint();
        self.data = selection
            .value_names()
            .into_iter()
            .map(|name| (name.to_string(), String::new()))
            .collect();
        self.document_copy = match self.request_type {
            RequestType::Document => Some(selection.document_copy()),
            RequestType::Account => None,
        };
    }
}

fn check_type(expected: RequestType, selection: &FieldSelection) -> Result<()> {
    let actual = selection.request_type();
    if actual != expected {
        return Err(CoreError::RequestTypeMismatch { expected, actual });
    }
    Ok(())
}
