//! Field vectors for deterministic verification.
//!
//! Duplicate detection compares stored fingerprints, so every
//! implementation reading the same ledger must canonicalize field lists
//! identically.

use idvault_core::{FieldSelection, RequestType, Result};

/// A field list and the fingerprint it must produce.
#[derive(Debug, Clone)]
pub struct FieldVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub request_type: RequestType,
    /// Field names as a caller might supply them.
    pub fields: &'static [&'static str],
    pub expected: &'static str,
}

/// Get all field vectors.
pub fn all_vectors() -> Vec<FieldVector> {
    vec![
        FieldVector {
            name: "single account field",
            request_type: RequestType::Account,
            fields: &["email"],
            expected: "email",
        },
        FieldVector {
            name: "account fields sort by name",
            request_type: RequestType::Account,
            fields: &["phone", "firstName", "email"],
            expected: "email+firstName+phone",
        },
        FieldVector {
            name: "repeated names collapse",
            request_type: RequestType::Account,
            fields: &["lastName", "lastName", " lastName "],
            expected: "lastName",
        },
        FieldVector {
            name: "document fields",
            request_type: RequestType::Document,
            fields: &["holder", "countryIssue"],
            expected: "countryIssue+holder",
        },
        FieldVector {
            name: "document copy sorts with fields",
            request_type: RequestType::Document,
            fields: &["holder", "documentCopy", "documentName"],
            expected: "documentCopy+documentName+holder",
        },
        FieldVector {
            name: "document copy alone",
            request_type: RequestType::Document,
            fields: &["documentCopy"],
            expected: "documentCopy",
        },
    ]
}

/// Fingerprint a vector's field list.
pub fn fingerprint_of(vector: &FieldVector) -> Result<String> {
    Ok(FieldSelection::parse(vector.request_type, vector.fields)?.fingerprint())
}

/// Check every vector, reporting `(name, matches, actual)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = fingerprint_of(v).unwrap_or_else(|e| e.to_string());
            (v.name.to_string(), actual == v.expected, actual)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, actual) in verify_all_vectors() {
            assert!(matches, "vector '{name}' produced '{actual}'");
        }
    }

    #[test]
    fn test_fingerprint_roundtrips() {
        for vector in all_vectors() {
            let fingerprint = fingerprint_of(&vector).unwrap();
            let rebuilt = FieldSelection::from_fingerprint(vector.request_type, &fingerprint)
                .unwrap();
            assert_eq!(rebuilt.fingerprint(), fingerprint, "vector '{}'", vector.name);
        }
    }
}
