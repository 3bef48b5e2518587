//! Document directories and their versions.
//!
//! A [`DocumentDirectory`] is the history of one named document. Versions are
//! kept in an ordered map keyed by version number.
//!
//! ## Version numbering
//!
//! Numbers start at 1 and strictly increase. The directory keeps a
//! high-water mark of the largest number ever assigned, so deleting the
//! newest version never lets its number be handed out again:
//!
//! ```text
//! next = max(max existing, high water) + 1
//! ```
//!
//! An empty, never-versioned directory yields 1.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::fields::{DocumentField, FieldSource};
use crate::types::{ContentId, KeyMaterial, KeyRef};
use crate::validation::require_text;

/// Normalize a document name to its directory key.
///
/// Names are unique case-insensitively within an account.
pub fn normalize_document_name(name: &str) -> Result<String> {
    Ok(require_text("document name", name)?.to_lowercase())
}

/// Descriptive metadata for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentData {
    pub holder: String,
    pub country_issue: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Metadata for one immutable encrypted artifact.
///
/// The content itself lives in the blob store under `content_ref`. The
/// symmetric content key is only ever stored wrapped under `public_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub number: u32,
    pub content_ref: ContentId,
    pub public_key: KeyMaterial,
    pub wrapped_key: KeyMaterial,
    pub key_ref: KeyRef,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DocumentVersion {
    /// Name of this version's link inside the directory's blob node.
    pub fn link_name(&self) -> String {
        self.number.to_string()
    }
}

/// The history of one named document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDirectory {
    /// Display name as first supplied.
    pub document_name: String,

    pub document_data: DocumentData,

    versions: BTreeMap<u32, DocumentVersion>,

    /// Largest version number ever assigned.
    highest_version: u32,

    /// Current blob-store node linking this document's versions.
    pub blob_ref: ContentId,
}

impl DocumentDirectory {
    /// Create an empty directory.
    pub fn new(
        document_name: &str,
        holder: &str,
        country_issue: &str,
        blob_ref: ContentId,
        now: i64,
    ) -> Result<Self> {
        Ok(Self {
            document_name: require_text("document name", document_name)?.to_string(),
            document_data: DocumentData {
                holder: require_text("holder", holder)?.to_string(),
                country_issue: require_text("country of issue", country_issue)?.to_string(),
                created_at: now,
                updated_at: now,
            },
            versions: BTreeMap::new(),
            highest_version: 0,
            blob_ref,
        })
    }

    /// The directory key for this document.
    pub fn key(&self) -> String {
        self.document_name.to_lowercase()
    }

    /// The number the next created version must carry.
    ///
    /// Fails once `u32::MAX` has been assigned; numbers are never reused.
    pub fn next_version(&self) -> Result<u32> {
        let max_existing = self.versions.keys().next_back().copied().unwrap_or(0);
        max_existing
            .max(self.highest_version)
            .checked_add(1)
            .ok_or_else(|| CoreError::VersionsExhausted(self.key()))
    }

    /// Append a version. Its number must equal [`Self::next_version`].
    pub fn insert_version(&mut self, version: DocumentVersion) -> Result<()> {
        let expected = self.next_version()?;
        if version.number != expected {
            return Err(CoreError::InvalidVersion {
                expected,
                got: version.number,
            });
        }
        self.highest_version = version.number;
        self.document_data.updated_at = version.created_at;
        self.versions.insert(version.number, version);
        Ok(())
    }

    /// Remove a version's metadata. The directory is kept even when empty.
    pub fn remove_version(&mut self, number: u32, now: i64) -> Result<DocumentVersion> {
        let removed = self
            .versions
            .remove(&number)
            .ok_or_else(|| self.version_not_found(number))?;
        self.document_data.updated_at = now;
        Ok(removed)
    }

    pub fn version(&self, number: u32) -> Result<&DocumentVersion> {
        self.versions
            .get(&number)
            .ok_or_else(|| self.version_not_found(number))
    }

    /// The highest-numbered surviving version.
    pub fn latest_version(&self) -> Option<&DocumentVersion> {
        self.versions.values().next_back()
    }

    /// Versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = &DocumentVersion> {
        self.versions.values()
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Update an editable metadata field.
    ///
    /// The document name is the directory key and cannot change.
    pub fn set_field(&mut self, field: DocumentField, value: &str, now: i64) -> Result<()> {
        match field {
            DocumentField::Holder => {
                self.document_data.holder = require_text("holder", value)?.to_string();
            }
            DocumentField::CountryIssue => {
                self.document_data.country_issue =
                    require_text("country of issue", value)?.to_string();
            }
            DocumentField::DocumentName => {
                return Err(CoreError::InvalidField(field.as_str().to_string()));
            }
        }
        self.document_data.updated_at = now;
        Ok(())
    }

    fn version_not_found(&self, version: u32) -> CoreError {
        CoreError::VersionNotFound {
            document: self.document_name.clone(),
            version,
        }
    }
}

impl FieldSource for DocumentDirectory {
    fn field_value(&self, name: &str) -> Option<String> {
        match name.parse::<DocumentField>().ok()? {
            DocumentField::DocumentName => Some(self.document_name.clone()),
            DocumentField::Holder => Some(self.document_data.holder.clone()),
            DocumentField::CountryIssue => Some(self.document_data.country_issue.clone()),
        }
    }
}
