//! Proptest generators for property-based testing.

use proptest::prelude::*;

use idvault_core::{AccountField, AccountProfile, DocumentField, PrivateId, DOCUMENT_COPY};
use idvault_crypto::{AccountKey, SymmetricKey};

/// Generate a random PrivateId.
pub fn private_id() -> impl Strategy<Value = PrivateId> {
    any::<[u8; 32]>().prop_map(PrivateId::from_bytes)
}

/// Generate an account key from raw bytes.
pub fn account_key() -> impl Strategy<Value = AccountKey> {
    any::<[u8; 32]>().prop_map(|bytes| {
        AccountKey::from_symmetric(SymmetricKey::from_slice(&bytes).expect("32-byte key"))
    })
}

/// Generate a non-blank free-text value.
pub fn text() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z '-]{0,31}".prop_map(String::from)
}

/// Generate a structurally valid email address.
pub fn email() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.]{0,15}@[a-z]{1,12}\\.[a-z]{2,4}".prop_map(String::from)
}

/// Generate a phone number, possibly empty.
pub fn phone() -> impl Strategy<Value = String> {
    "(\\+[0-9]{6,14})?".prop_map(String::from)
}

/// Generate a profile that passes registration validation.
pub fn account_profile() -> impl Strategy<Value = AccountProfile> {
    (text(), text(), email(), phone())
        .prop_map(|(first, last, email, phone)| AccountProfile::new(first, last, email, phone))
}

/// Generate a document name.
pub fn document_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _-]{0,23}".prop_map(String::from)
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

pub fn account_field() -> impl Strategy<Value = AccountField> {
    prop::sample::select(AccountField::ALL.to_vec())
}

pub fn document_field() -> impl Strategy<Value = DocumentField> {
    prop::sample::select(DocumentField::ALL.to_vec())
}

/// A non-empty set of account field names in random order.
pub fn account_field_names() -> impl Strategy<Value = Vec<String>> {
    let names: Vec<String> = AccountField::ALL
        .iter()
        .map(|f| f.as_str().to_string())
        .collect();
    let len = names.len();
    prop::sample::subsequence(names, 1..=len).prop_shuffle()
}

/// A non-empty set of document field names, possibly including
/// `documentCopy`, in random order.
pub fn document_field_names() -> impl Strategy<Value = Vec<String>> {
    let mut names: Vec<String> = DocumentField::ALL
        .iter()
        .map(|f| f.as_str().to_string())
        .collect();
    names.push(DOCUMENT_COPY.to_string());
    let len = names.len();
    prop::sample::subsequence(names, 1..=len).prop_shuffle()
}

/// One step in a document's version history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    Add,
    /// Delete the surviving version at this index, modulo the count.
    Delete(usize),
}

pub fn version_op() -> impl Strategy<Value = VersionOp> {
    prop_oneof![
        3 => Just(VersionOp::Add),
        1 => any::<usize>().prop_map(VersionOp::Delete),
    ]
}

/// A sequence of version operations.
pub fn version_ops(max_len: usize) -> impl Strategy<Value = Vec<VersionOp>> {
    prop::collection::vec(version_op(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use idvault_core::{AccountData, FieldSelection, RequestType};

    proptest! {
        #[test]
        fn test_generated_profiles_validate(profile in account_profile()) {
            prop_assert!(AccountData::from_profile(&profile, 0).is_ok());
        }

        #[test]
        fn test_generated_account_names_parse(names in account_field_names()) {
            let selection = FieldSelection::parse(RequestType::Account, &names);
            prop_assert!(selection.is_ok());
        }

        #[test]
        fn test_generated_document_names_parse(names in document_field_names()) {
            let selection = FieldSelection::parse(RequestType::Document, &names).unwrap();
            prop_assert_eq!(selection.names().len(), names.len());
        }

        #[test]
        fn test_generated_document_names_normalize(name in document_name()) {
            prop_assert!(idvault_core::normalize_document_name(&name).is_ok());
        }
    }
}
