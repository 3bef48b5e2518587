//! The account aggregate.
//!
//! A [`PersonAccount`] exclusively owns its document directories. The whole
//! aggregate is serialized and encrypted as one record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::{normalize_document_name, DocumentDirectory};
use crate::error::{CoreError, Result};
use crate::fields::{AccountField, FieldSource};
use crate::types::{ContentId, PrivateId, PublicId};
use crate::validation::{optional_text, require_email, require_text};

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl AccountProfile {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }
}

/// Personal fields of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AccountData {
    /// Validate a profile into account data.
    pub fn from_profile(profile: &AccountProfile, now: i64) -> Result<Self> {
        Ok(Self {
            first_name: require_text("first name", &profile.first_name)?.to_string(),
            last_name: require_text("last name", &profile.last_name)?.to_string(),
            email: require_email(&profile.email)?.to_string(),
            phone: optional_text("phone", &profile.phone)?.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get(&self, field: AccountField) -> &str {
        match field {
            AccountField::FirstName => &self.first_name,
            AccountField::LastName => &self.last_name,
            AccountField::Email => &self.email,
            AccountField::Phone => &self.phone,
        }
    }

    /// Replace one field, validating it the same way registration does.
    pub fn set(&mut self, field: AccountField, value: &str, now: i64) -> Result<()> {
        match field {
            AccountField::FirstName => {
                self.first_name = require_text("first name", value)?.to_string()
            }
            AccountField::LastName => self.last_name = require_text("last name", value)?.to_string(),
            AccountField::Email => self.email = require_email(value)?.to_string(),
            AccountField::Phone => self.phone = optional_text("phone", value)?.to_string(),
        }
        self.updated_at = now;
        Ok(())
    }
}

impl FieldSource for AccountData {
    fn field_value(&self, name: &str) -> Option<String> {
        let field = name.parse::<AccountField>().ok()?;
        Some(self.get(field).to_string())
    }
}

/// One identity and everything it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonAccount {
    pub public_id: PublicId,
    pub private_id: PrivateId,
    pub account_data: AccountData,
    documents: BTreeMap<String, DocumentDirectory>,
    /// Current blob-store node linking every document directory.
    pub blob_root: ContentId,
}

impl PersonAccount {
    /// Create a new account with no documents.
    pub fn new(
        private_id: PrivateId,
        profile: &AccountProfile,
        blob_root: ContentId,
        now: i64,
    ) -> Result<Self> {
        Ok(Self {
            public_id: private_id.public_id(),
            private_id,
            account_data: AccountData::from_profile(profile, now)?,
            documents: BTreeMap::new(),
            blob_root,
        })
    }

    /// Whether the stored public id still matches the private id.
    pub fn is_consistent(&self) -> bool {
        self.private_id.public_id() == self.public_id
    }

    pub fn has_document(&self, name: &str) -> bool {
        normalize_document_name(name)
            .map(|key| self.documents.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn document(&self, name: &str) -> Result<&DocumentDirectory> {
        let key = normalize_document_name(name)?;
        self.documents
            .get(&key)
            .ok_or_else(|| CoreError::DocumentNotFound(name.trim().to_string()))
    }

    pub fn document_mut(&mut self, name: &str) -> Result<&mut DocumentDirectory> {
        let key = normalize_document_name(name)?;
        self.documents
            .get_mut(&key)
            .ok_or_else(|| CoreError::DocumentNotFound(name.trim().to_string()))
    }

    /// Fail with [`CoreError::DuplicateDocument`] if `name` is taken.
    pub fn ensure_document_absent(&self, name: &str) -> Result<String> {
        let key = normalize_document_name(name)?;
        if self.documents.contains_key(&key) {
            return Err(CoreError::DuplicateDocument(name.trim().to_string()));
        }
        Ok(key)
    }

    pub fn insert_document(&mut self, directory: DocumentDirectory) -> Result<()> {
        let key = self.ensure_document_absent(&directory.document_name)?;
        self.documents.insert(key, directory);
        Ok(())
    }

    pub fn remove_document(&mut self, name: &str) -> Result<DocumentDirectory> {
        let key = normalize_document_name(name)?;
        self.documents
            .remove(&key)
            .ok_or_else(|| CoreError::DocumentNotFound(name.trim().to_string()))
    }

    /// Documents ordered by key.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentDirectory> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AccountProfile {
        AccountProfile::new("anna", "angelova", "anna@x.io", "555")
    }

    fn account() -> PersonAccount {
        PersonAccount::new(
            PrivateId::from_bytes([7; 32]),
            &profile(),
            ContentId::from_bytes([0; 32]),
            1000,
        )
        .unwrap()
    }

    fn passport() -> DocumentDirectory {
        DocumentDirectory::new("Passport", "anna", "NL", ContentId::from_bytes([1; 32]), 1000)
            .unwrap()
    }

    #[test]
    fn test_new_account_derives_public_id() {
        let acct = account();
        assert_eq!(acct.public_id, PrivateId::from_bytes([7; 32]).public_id());
        assert!(acct.is_consistent());
    }

    #[test]
    fn test_profile_validation() {
        let mut bad = profile();
        bad.first_name = " ".into();
        assert!(AccountData::from_profile(&bad, 0).is_err());

        let mut bad = profile();
        bad.email = "not-an-email".into();
        assert!(AccountData::from_profile(&bad, 0).is_err());

        let mut ok = profile();
        ok.phone = String::new();
        assert!(AccountData::from_profile(&ok, 0).is_ok());
    }

    #[test]
    fn test_document_names_case_insensitive() {
        let mut acct = account();
        acct.insert_document(passport()).unwrap();

        assert!(acct.has_document("PASSPORT"));
        assert!(acct.document("passport").is_ok());

        let dup = DocumentDirectory::new("passport", "x", "y", ContentId::from_bytes([2; 32]), 0)
            .unwrap();
        assert!(matches!(
            acct.insert_document(dup),
            Err(CoreError::DuplicateDocument(_))
        ));
    }

    #[test]
    fn test_remove_document() {
        let mut acct = account();
        acct.insert_document(passport()).unwrap();
        acct.remove_document("Passport").unwrap();
        assert_eq!(acct.document_count(), 0);
        assert!(matches!(
            acct.remove_document("passport"),
            Err(CoreError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_set_field() {
        let mut data = account().account_data;
        data.set(AccountField::Email, "anna@y.io", 2000).unwrap();
        assert_eq!(data.email, "anna@y.io");
        assert_eq!(data.updated_at, 2000);
        assert!(data.set(AccountField::LastName, "", 0).is_err());
    }

    #[test]
    fn test_field_source() {
        let data = account().account_data;
        assert_eq!(data.field_value("firstName").as_deref(), Some("anna"));
        assert_eq!(data.field_value("phone").as_deref(), Some("555"));
        assert_eq!(data.field_value("holder"), None);
    }

    #[test]
    fn test_json_shape() {
        let mut acct = account();
        acct.insert_document(passport()).unwrap();
        let json = serde_json::to_value(&acct).unwrap();

        assert_eq!(json["publicId"], acct.public_id.to_hex());
        assert_eq!(json["accountData"]["firstName"], "anna");
        assert_eq!(json["accountData"]["phone"], "555");
        assert!(json["documents"]["passport"].is_object());

        let back: PersonAccount = serde_json::from_value(json).unwrap();
        assert_eq!(back, acct);
    }
}
